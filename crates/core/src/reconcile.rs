//! Join of the parsed registry tables into one canonical record per product.
//!
//! Pure: the persistence layer consumes the records produced here. The
//! shortage table is authoritative for status; the catalog, composition and
//! generic-group tables only enrich the record.

use chrono::NaiveDate;

use crate::availability::{parse_registry_date, ClassificationPolicy, MedicationStatus};
use crate::registry::{
    CatalogEntry, CatalogTable, CompositionTable, GenericGroupTable, ShortageTable,
};

/// Descriptive attributes of a product, independent of its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub product_code: String,
    pub name: String,
    /// `false` when the name is the fallback for a code the catalog lacks.
    pub in_catalog: bool,
    pub form: Option<String>,
    pub route: Option<String>,
    pub manufacturer: Option<String>,
    pub active_ingredient: Option<String>,
    pub generic_group: Option<String>,
}

/// A product with the status derived from the shortage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledProduct {
    pub record: ProductRecord,
    pub status: MedicationStatus,
    pub status_text: String,
    pub level: i32,
    pub expected_return_date: Option<NaiveDate>,
    pub info_url: Option<String>,
}

/// Number of shortage-table entries per classified status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortageCounts {
    pub shortage: usize,
    pub tension: usize,
}

/// Read-only lookup tables used to enrich product records.
#[derive(Debug, Clone, Copy)]
pub struct Enrichment<'a> {
    pub catalog: &'a CatalogTable,
    pub composition: &'a CompositionTable,
    pub generic_groups: &'a GenericGroupTable,
}

/// Name used when a shortage row references a product the catalog lacks.
pub fn fallback_name(product_code: &str) -> String {
    format!("Product {product_code}")
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl Enrichment<'_> {
    fn record_from(&self, product_code: &str, catalog: Option<&CatalogEntry>) -> ProductRecord {
        let name = catalog
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name(product_code));
        ProductRecord {
            product_code: product_code.to_string(),
            name,
            in_catalog: catalog.is_some(),
            form: catalog.and_then(|c| non_empty(&c.form)),
            route: catalog.and_then(|c| non_empty(&c.route)),
            manufacturer: catalog.and_then(|c| non_empty(&c.manufacturer)),
            active_ingredient: self
                .composition
                .get(product_code)
                .map(|c| c.substance.clone()),
            generic_group: self
                .generic_groups
                .get(product_code)
                .map(|g| g.group_label.clone()),
        }
    }

    /// Build a record for every catalog product.
    pub fn catalog_records(&self) -> Vec<ProductRecord> {
        self.catalog
            .iter()
            .map(|(code, entry)| self.record_from(code, Some(entry)))
            .collect()
    }

    /// Build the reconciled record for every product in the shortage table.
    ///
    /// Products missing from the catalog still get a record, named with
    /// [`fallback_name`].
    pub fn reconcile_shortages(
        &self,
        shortages: &ShortageTable,
        policy: &ClassificationPolicy,
    ) -> Vec<ReconciledProduct> {
        shortages
            .iter()
            .map(|(code, entry)| ReconciledProduct {
                record: self.record_from(code, self.catalog.get(code)),
                status: policy.classify(&entry.status_text),
                status_text: entry.status_text.clone(),
                level: entry.level,
                expected_return_date: entry.end_date.as_deref().and_then(parse_registry_date),
                info_url: entry.info_url.clone(),
            })
            .collect()
    }
}

/// Count reconciled products per status.
pub fn count_statuses(products: &[ReconciledProduct]) -> ShortageCounts {
    products
        .iter()
        .fold(ShortageCounts::default(), |mut counts, p| {
            match p.status {
                MedicationStatus::Shortage => counts.shortage += 1,
                MedicationStatus::Tension => counts.tension += 1,
                MedicationStatus::Available | MedicationStatus::Unknown => {}
            }
            counts
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
