//! Starter catalogue loaded into an empty ledger.

use common::Money;

use crate::NewProduct;

/// The products a fresh product service starts with.
pub fn default_catalogue() -> Vec<NewProduct> {
    vec![
        NewProduct::new("Laptop", Money::from_major(25000), 50).with_category("electronics"),
        NewProduct::new("Kulaklık", Money::from_major(500), 200).with_category("electronics"),
        NewProduct::new("Klavye", Money::from_major(750), 100).with_category("electronics"),
        NewProduct::new("Tişört", Money::from_major(150), 300).with_category("clothing"),
        NewProduct::new("Kitap - Node.js", Money::from_major(80), 150).with_category("books"),
    ]
}
