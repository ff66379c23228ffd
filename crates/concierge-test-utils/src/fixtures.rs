// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog, knowledge-base and site-info fixtures.
//!
//! Fixtures are raw JSON so every crate can parse them with its own types.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Focus product used across scenario tests.
pub const BACKPACK_ID: &str = "jwl-outdoor-018";
pub const BACKPACK_SLUG: &str = "multi-day-hiking-backpack";

/// A small bilingual catalog.
pub fn products_json() -> Value {
    json!([
        {
            "id": BACKPACK_ID,
            "slug": BACKPACK_SLUG,
            "name": {"en": "Multi-day Hiking Backpack", "zh": "多日徒步背包"},
            "description": {
                "en": "60L trekking backpack with rain cover and padded hip belt.",
                "zh": "60升徒步背包，配防雨罩和加厚腰带。"
            },
            "category": "outdoor",
            "tags": ["backpack", "hiking", "travel"],
            "materials": ["nylon", "polyester"],
            "specifications": {"capacity": "60L", "weight": "1.6kg"},
            "variants": [
                {"key": "red", "sku": "JWL-018-RED", "en": "Red", "zh": "红色"},
                {"key": "black", "sku": "JWL-018-BLK", "en": "Black", "zh": "黑色"}
            ]
        },
        {
            "id": "jwl-lunch-001",
            "slug": "insulated-lunch-bag",
            "name": {"en": "Insulated Lunch Bag", "zh": "保温午餐包"},
            "description": {"en": "Keeps food cold for six hours. Wipe-clean lining."},
            "category": "lunch",
            "tags": ["lunch", "cooler"],
            "materials": ["polyester", "aluminum foil"],
            "specifications": {"capacity": "8L"}
        },
        {
            "id": "jwl-tote-007",
            "slug": "canvas-tote-bag",
            "name": {"en": "Canvas Tote Bag", "zh": "帆布托特包"},
            "description": {"en": "Heavy cotton canvas shopping tote with inner pocket."},
            "category": "tote",
            "tags": ["tote", "shopping"],
            "materials": ["cotton canvas"]
        }
    ])
}

/// Knowledge chunks as JSONL lines, one file's worth.
pub fn kb_lines() -> Vec<Value> {
    vec![
        json!({"text": "Our minimum order quantity (MOQ) is 300 pieces per design.", "metadata": {"lang": "en", "kb_id": "moq"}}),
        json!({"text": "Sample lead time is 7 days; bulk production takes 30 days.", "metadata": {"lang": "en"}}),
        json!({"text": "Contact {{COMPANY_NAME}} sales at {{SALES_EMAIL}}.", "metadata": {"lang": "en", "kb_id": "contact"}}),
        json!({"text": "最小起订量为每款300个。", "metadata": {"lang": "zh", "kb_id": "moq-zh"}}),
        json!({"text": "We ship worldwide by sea and air freight.", "metadata": {}})
    ]
}

/// Site information used for KB templating.
pub fn site_info_json() -> Value {
    json!({
        "companyName": {"en": "Jwl Bags", "zh": "杰威尔箱包"},
        "contact": {"email": {"en": "sales@jwl.example"}, "phone": "+86 20 0000 0000"},
        "markets": ["EU", "US"]
    })
}

/// A catalog directory on disk: `products.json`, `kb/faq.jsonl`, `site_info.json`.
pub struct CatalogDir {
    pub dir: tempfile::TempDir,
}

impl CatalogDir {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("products.json"), products_json().to_string())?;
        std::fs::create_dir_all(dir.path().join("kb"))?;
        let lines: Vec<String> = kb_lines().iter().map(Value::to_string).collect();
        std::fs::write(dir.path().join("kb/faq.jsonl"), lines.join("\n"))?;
        std::fs::write(dir.path().join("site_info.json"), site_info_json().to_string())?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn products_path(&self) -> PathBuf {
        self.dir.path().join("products.json")
    }

    pub fn kb_dir(&self) -> PathBuf {
        self.dir.path().join("kb")
    }

    pub fn site_info_path(&self) -> PathBuf {
        self.dir.path().join("site_info.json")
    }
}
