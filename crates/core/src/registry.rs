//! Parsers for the regulator's open-data registry files.
//!
//! Every file is tab-separated, Latin-1 encoded, one record per line and has
//! no header row. Each parser keeps lines with at least its minimum column
//! count, trims every field and folds the rows into a table keyed by product
//! code. Lines that are too short (or carry no product code) are skipped
//! silently: the files routinely contain partial noise and a skipped line is
//! not an error.
//!
//! When a product code appears on several lines the outcome is decided by an
//! explicit [`MergeStrategy`] per file shape. The asymmetry between the
//! composition file (first wins) and the shortage file (last wins) follows
//! the structure of the source files.

use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// File identifiers
// ---------------------------------------------------------------------------

/// The registry files consumed by a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryFile {
    /// Product catalog (one row per product).
    Catalog,
    /// Active-ingredient composition (several rows per product).
    Composition,
    /// Shortage / availability status.
    Shortage,
    /// Generic group membership. Optional enrichment.
    GenericGroups,
}

impl RegistryFile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Composition => "composition",
            Self::Shortage => "shortage",
            Self::GenericGroups => "generic_groups",
        }
    }

    /// File name used by the regulator's download service and local caches.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Catalog => "CIS_bdpm.txt",
            Self::Composition => "CIS_COMPO_bdpm.txt",
            Self::Shortage => "CIS_CIP_Dispo_Spec.txt",
            Self::GenericGroups => "CIS_GENER_bdpm.txt",
        }
    }

    /// The three files every pass requires.
    pub const REQUIRED: [RegistryFile; 3] = [Self::Catalog, Self::Composition, Self::Shortage];
}

impl std::fmt::Display for RegistryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode Latin-1 (ISO-8859-1) bytes to a string.
///
/// Every byte maps to the code point of the same value, so this cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Split decoded text into records, dropping blank lines and trailing `\r`.
pub fn records(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Merge strategy
// ---------------------------------------------------------------------------

/// How a table resolves several rows for the same product code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the first row seen; later rows are ignored.
    FirstWins,
    /// Each later row replaces the earlier one.
    LastWins,
}

/// Catalog codes are unique in practice; a duplicate replaces the earlier row.
pub const CATALOG_MERGE: MergeStrategy = MergeStrategy::LastWins;

/// Combination drugs list several active substances; only the first is kept.
pub const COMPOSITION_MERGE: MergeStrategy = MergeStrategy::FirstWins;

/// Later shortage rows are the most recent entry for the product.
pub const SHORTAGE_MERGE: MergeStrategy = MergeStrategy::LastWins;

/// A product belongs to one generic group; the first membership is kept.
pub const GENERIC_GROUP_MERGE: MergeStrategy = MergeStrategy::FirstWins;

/// Minimum column counts per file shape.
pub const CATALOG_MIN_COLUMNS: usize = 11;
pub const COMPOSITION_MIN_COLUMNS: usize = 7;
pub const SHORTAGE_MIN_COLUMNS: usize = 5;
pub const GENERIC_GROUP_MIN_COLUMNS: usize = 3;

/// Nature flag marking the active substance in the composition file.
const ACTIVE_SUBSTANCE_FLAG: &str = "SA";

/// A table of parsed rows keyed by product code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTable<T> {
    rows: BTreeMap<String, T>,
}

impl<T> Default for RegistryTable<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T> RegistryTable<T> {
    fn merge(&mut self, code: String, row: T, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::FirstWins => {
                self.rows.entry(code).or_insert(row);
            }
            MergeStrategy::LastWins => {
                self.rows.insert(code, row);
            }
        }
    }

    pub fn get(&self, product_code: &str) -> Option<&T> {
        self.rows.get(product_code)
    }

    pub fn contains(&self, product_code: &str) -> bool {
        self.rows.contains_key(product_code)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in product-code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.rows.iter().map(|(code, row)| (code.as_str(), row))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}

/// Split a line on tabs and trim each field.
///
/// Returns `None` when the line has fewer than `min_columns` fields or an
/// empty product code in column 0.
fn split_fields(line: &str, min_columns: usize) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < min_columns || fields[0].is_empty() {
        return None;
    }
    Some(fields)
}

fn optional_field(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A product row from the catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product_code: String,
    pub name: String,
    pub form: String,
    pub route: String,
    pub manufacturer: String,
}

pub type CatalogTable = RegistryTable<CatalogEntry>;

/// Parse the catalog file: code (0), name (1), form (2), route (3),
/// manufacturer (10).
pub fn parse_catalog<S: AsRef<str>>(lines: &[S]) -> CatalogTable {
    let mut table = CatalogTable::default();
    for line in lines {
        let Some(fields) = split_fields(line.as_ref(), CATALOG_MIN_COLUMNS) else {
            continue;
        };
        let entry = CatalogEntry {
            product_code: fields[0].to_string(),
            name: fields[1].to_string(),
            form: fields[2].to_string(),
            route: fields[3].to_string(),
            manufacturer: fields[10].to_string(),
        };
        table.merge(entry.product_code.clone(), entry, CATALOG_MERGE);
    }
    table
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// The active substance retained for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionEntry {
    pub product_code: String,
    pub substance: String,
}

pub type CompositionTable = RegistryTable<CompositionEntry>;

/// Parse the composition file: code (0), substance (3), nature (6).
///
/// Only active-substance rows (`SA`) are kept.
pub fn parse_composition<S: AsRef<str>>(lines: &[S]) -> CompositionTable {
    let mut table = CompositionTable::default();
    for line in lines {
        let Some(fields) = split_fields(line.as_ref(), COMPOSITION_MIN_COLUMNS) else {
            continue;
        };
        if !fields[6].eq_ignore_ascii_case(ACTIVE_SUBSTANCE_FLAG) || fields[3].is_empty() {
            continue;
        }
        let entry = CompositionEntry {
            product_code: fields[0].to_string(),
            substance: fields[3].to_string(),
        };
        table.merge(entry.product_code.clone(), entry, COMPOSITION_MERGE);
    }
    table
}

// ---------------------------------------------------------------------------
// Shortage
// ---------------------------------------------------------------------------

/// A row from the shortage / availability file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortageEntry {
    pub product_code: String,
    /// Severity level; 0 when the column is not a number.
    pub level: i32,
    pub status_text: String,
    /// Start date as written in the file.
    pub start_date: String,
    pub end_date: Option<String>,
    pub info_url: Option<String>,
}

impl ShortageEntry {
    /// Composite identity of a shortage episode, used by the file diff.
    pub fn key(&self) -> (String, String) {
        (self.product_code.clone(), self.start_date.clone())
    }
}

pub type ShortageTable = RegistryTable<ShortageEntry>;

/// Parse a single shortage line, or `None` when it is malformed.
pub fn parse_shortage_line(line: &str) -> Option<ShortageEntry> {
    let fields = split_fields(line, SHORTAGE_MIN_COLUMNS)?;
    Some(ShortageEntry {
        product_code: fields[0].to_string(),
        level: fields[2].parse().unwrap_or(0),
        status_text: fields[3].to_string(),
        start_date: fields[4].to_string(),
        end_date: optional_field(&fields, 5),
        info_url: optional_field(&fields, 7),
    })
}

/// Parse the shortage file: code (0), level (2), status text (3), start date
/// (4), end date (5, optional), information URL (7, optional).
pub fn parse_shortages<S: AsRef<str>>(lines: &[S]) -> ShortageTable {
    let mut table = ShortageTable::default();
    for entry in lines
        .iter()
        .filter_map(|line| parse_shortage_line(line.as_ref()))
    {
        table.merge(entry.product_code.clone(), entry, SHORTAGE_MERGE);
    }
    table
}

// ---------------------------------------------------------------------------
// Generic groups
// ---------------------------------------------------------------------------

/// Generic group membership of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericGroupEntry {
    pub product_code: String,
    pub group_label: String,
}

/// Read-only lookup of generic group labels, built once per pass and passed
/// to the reconciler.
pub type GenericGroupTable = RegistryTable<GenericGroupEntry>;

/// Parse the generic group file: group id (0), label (1), code (2).
///
/// The product code sits in column 2 here, not column 0.
pub fn parse_generic_groups<S: AsRef<str>>(lines: &[S]) -> GenericGroupTable {
    let mut table = GenericGroupTable::default();
    for line in lines {
        let fields: Vec<&str> = line.as_ref().split('\t').map(str::trim).collect();
        if fields.len() < GENERIC_GROUP_MIN_COLUMNS || fields[2].is_empty() {
            continue;
        }
        let entry = GenericGroupEntry {
            product_code: fields[2].to_string(),
            group_label: fields[1].to_string(),
        };
        table.merge(entry.product_code.clone(), entry, GENERIC_GROUP_MERGE);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
