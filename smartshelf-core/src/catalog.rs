//! Product catalog and its encoding for the loadcell firmware
//!
//! The catalog is an ordered product list; the product at index `i` sits in
//! slot `i`. Loadcell units receive three byte tables for their own slots:
//! unit weight (weight / 3), price (price / 1000) and a `;`-joined ASCII name
//! table. Unit 1 receives the name bytes up to and including the
//! `LOADCELL_NUM_1`-th separator, unit 2 the rest.

use serde::{Deserialize, Serialize};
use smartshelf_common::slots::{LoadcellUnit, LOADCELL_NUM_1};

/// Longest product name the unit display accepts
pub const DEVICE_NAME_LEN: usize = 16;

const NAME_SEPARATOR: u8 = b';';

/// One product as published by the cloud catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(alias = "_id", default)]
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    /// Price in the smallest currency unit
    #[serde(default)]
    pub price: u64,
    /// Weight of one item in grams
    #[serde(default)]
    pub weight: u64,
    /// Percent discount
    #[serde(default)]
    pub discount: u32,
    #[serde(default)]
    pub img_url: Option<String>,
}

impl Product {
    /// Unit price after the percent discount, rounded to the nearest unit
    pub fn discounted_price(&self) -> u64 {
        if self.discount == 0 {
            return self.price;
        }
        let discount = self.discount.min(100) as f64;
        (self.price as f64 * (1.0 - discount / 100.0)).round() as u64
    }
}

/// Ordered product list, index = slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn product(&self, slot: usize) -> Option<&Product> {
        self.products.get(slot)
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.products.iter().map(|p| p.product_id.clone()).collect()
    }

    /// Per-slot unit weight table for one unit
    pub fn unit_weights(&self, unit: LoadcellUnit) -> Vec<u8> {
        self.slice(unit)
            .iter()
            .map(|p| saturate(p.weight / 3))
            .collect()
    }

    /// Per-slot price table (thousands) for one unit
    pub fn unit_prices(&self, unit: LoadcellUnit) -> Vec<u8> {
        self.slice(unit)
            .iter()
            .map(|p| saturate(p.price / 1000))
            .collect()
    }

    /// Packed name table bytes for one unit
    pub fn unit_names(&self, unit: LoadcellUnit) -> Vec<u8> {
        let joined = self.packed_names();
        let cut = name_cut(&joined);
        match unit {
            LoadcellUnit::Unit1 => joined[..cut].to_vec(),
            LoadcellUnit::Unit2 => joined[cut..].to_vec(),
        }
    }

    fn packed_names(&self) -> Vec<u8> {
        let names: Vec<String> = self
            .products
            .iter()
            .map(|p| fold_to_ascii(&p.product_name).chars().take(DEVICE_NAME_LEN).collect())
            .collect();
        names.join(";").into_bytes()
    }

    fn slice(&self, unit: LoadcellUnit) -> &[Product] {
        let range = unit.slots();
        let start = range.start.min(self.products.len());
        let end = range.end.min(self.products.len());
        &self.products[start..end]
    }
}

fn saturate(value: u64) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Byte offset just past the separator that ends unit 1's names
fn name_cut(joined: &[u8]) -> usize {
    let mut separators = 0;
    for (i, &b) in joined.iter().enumerate() {
        if b == NAME_SEPARATOR {
            separators += 1;
            if separators == LOADCELL_NUM_1 {
                return i + 1;
            }
        }
    }
    joined.len()
}

/// Strip Vietnamese diacritics so names fit the unit's ASCII display
pub fn fold_to_ascii(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_ascii() {
                return Some(c);
            }
            let folded = match c {
                'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
                | 'ẩ' | 'ẫ' | 'ậ' => 'a',
                'À' | 'Á' | 'Ả' | 'Ã' | 'Ạ' | 'Ă' | 'Ằ' | 'Ắ' | 'Ẳ' | 'Ẵ' | 'Ặ' | 'Â' | 'Ầ' | 'Ấ'
                | 'Ẩ' | 'Ẫ' | 'Ậ' => 'A',
                'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
                'È' | 'É' | 'Ẻ' | 'Ẽ' | 'Ẹ' | 'Ê' | 'Ề' | 'Ế' | 'Ể' | 'Ễ' | 'Ệ' => 'E',
                'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
                'Ì' | 'Í' | 'Ỉ' | 'Ĩ' | 'Ị' => 'I',
                'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
                | 'ở' | 'ỡ' | 'ợ' => 'o',
                'Ò' | 'Ó' | 'Ỏ' | 'Õ' | 'Ọ' | 'Ô' | 'Ồ' | 'Ố' | 'Ổ' | 'Ỗ' | 'Ộ' | 'Ơ' | 'Ờ' | 'Ớ'
                | 'Ở' | 'Ỡ' | 'Ợ' => 'O',
                'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
                'Ù' | 'Ú' | 'Ủ' | 'Ũ' | 'Ụ' | 'Ư' | 'Ừ' | 'Ứ' | 'Ử' | 'Ữ' | 'Ự' => 'U',
                'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
                'Ỳ' | 'Ý' | 'Ỷ' | 'Ỹ' | 'Ỵ' => 'Y',
                'đ' => 'd',
                'Đ' => 'D',
                _ => return None,
            };
            Some(folded)
        })
        .collect()
}
