//! Field mapping model and YAML persistence.
//!
//! A [`FieldMapping`] says which sheet columns land in which table columns
//! and which conversion each one gets. The crate ships a built-in mapping
//! for the investment property workbook; `--mapping <file>` swaps in a YAML
//! file with the same shape, and `probe` writes a starter file from a sheet
//! sample.
//!
//! Mapping YAML looks like:
//!
//! ```yaml
//! table: public.investments
//! key_column: Asset ID
//! columns:
//!   - source: Purchase Price
//!     column: purchase_price
//!     datatype: currency
//! ```

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Table targeted by the built-in investment property mapping.
pub const INVESTMENTS_TABLE: &str = "public.investments";

/// Conversion applied to a source column before it reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Currency,
    Percentage,
    Date,
    Boolean,
    Integer,
    Decimal,
    Text,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Currency => "currency",
            SemanticType::Percentage => "percentage",
            SemanticType::Date => "date",
            SemanticType::Boolean => "boolean",
            SemanticType::Integer => "integer",
            SemanticType::Decimal => "decimal",
            SemanticType::Text => "text",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "currency",
            "percentage",
            "date",
            "boolean",
            "integer",
            "decimal",
            "text",
        ]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "currency" => Ok(SemanticType::Currency),
            "percentage" | "percent" => Ok(SemanticType::Percentage),
            "date" => Ok(SemanticType::Date),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            "integer" | "int" => Ok(SemanticType::Integer),
            "decimal" | "float" => Ok(SemanticType::Decimal),
            "text" | "string" => Ok(SemanticType::Text),
            _ => Err(anyhow!(
                "Unknown datatype '{value}'. Supported types: {}",
                SemanticType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for SemanticType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SemanticType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        SemanticType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// One source column bound to one destination column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMap {
    /// Column name as it appears in the sheet header row.
    pub source: String,
    /// Destination column in the target table.
    pub column: String,
    pub datatype: SemanticType,
}

/// The full source-to-table mapping for one sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    pub table: String,
    /// Source column whose value must be present for a row to be emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,
    pub columns: Vec<FieldMap>,
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("mapping has no columns")]
    Empty,
    #[error("table name '{table}' is not a valid SQL identifier")]
    InvalidTable { table: String },
    #[error("destination column '{column}' is not a valid SQL identifier")]
    InvalidColumn { column: String },
    #[error("destination column '{column}' is mapped more than once")]
    DuplicateColumn { column: String },
    #[error("source column '{name}' is mapped more than once")]
    DuplicateSource { name: String },
    #[error("key column '{key}' is not one of the mapped source columns")]
    UnknownKey { key: String },
}

fn identifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

/// Accepts plain and schema-qualified names (`investments`, `public.investments`).
fn valid_table_name(table: &str) -> bool {
    !table.is_empty() && table.split('.').all(|part| identifier().is_match(part))
}

/// A mapping resolved against an actual header row: entries paired with
/// their field index, entries whose source column the sheet lacks, and the
/// position of the key column if one is named.
#[derive(Debug)]
pub struct BoundMapping<'a> {
    pub columns: Vec<(usize, &'a FieldMap)>,
    pub missing: Vec<&'a str>,
    pub key_index: Option<usize>,
}

impl FieldMapping {
    /// The built-in mapping for the investment property workbook.
    pub fn investments() -> Self {
        FieldMapping {
            table: INVESTMENTS_TABLE.to_string(),
            key_column: Some("Asset ID".to_string()),
            columns: INVESTMENT_COLUMNS
                .iter()
                .map(|(source, column, datatype)| FieldMap {
                    source: (*source).to_string(),
                    column: (*column).to_string(),
                    datatype: *datatype,
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let reader = BufReader::new(file);
        let mapping: FieldMapping =
            serde_yaml::from_reader(reader).context("Parsing mapping YAML")?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Loads the mapping at `path`, or the built-in investments mapping
    /// when no file is named.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::investments()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping YAML")
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        if self.columns.is_empty() {
            return Err(MappingError::Empty);
        }
        if !valid_table_name(&self.table) {
            return Err(MappingError::InvalidTable {
                table: self.table.clone(),
            });
        }
        let mut seen_columns = HashSet::new();
        let mut seen_sources = HashSet::new();
        for map in &self.columns {
            if !identifier().is_match(&map.column) {
                return Err(MappingError::InvalidColumn {
                    column: map.column.clone(),
                });
            }
            if !seen_columns.insert(map.column.as_str()) {
                return Err(MappingError::DuplicateColumn {
                    column: map.column.clone(),
                });
            }
            if !seen_sources.insert(map.source.as_str()) {
                return Err(MappingError::DuplicateSource {
                    name: map.source.clone(),
                });
            }
        }
        if let Some(key) = &self.key_column
            && !self.columns.iter().any(|map| &map.source == key)
        {
            return Err(MappingError::UnknownKey { key: key.clone() });
        }
        Ok(())
    }

    /// Resolves each entry against the sheet's header row. Entries keep
    /// mapping order; sources absent from the sheet are reported, not bound.
    pub fn bind<'a>(&'a self, headers: &[String]) -> BoundMapping<'a> {
        let position = |name: &str| headers.iter().position(|header| header == name);
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();
        for map in &self.columns {
            match position(&map.source) {
                Some(index) => columns.push((index, map)),
                None => missing.push(map.source.as_str()),
            }
        }
        let key_index = self.key_column.as_deref().and_then(position);
        BoundMapping {
            columns,
            missing,
            key_index,
        }
    }
}

/// Column layout of the investment property workbook, in emission order.
const INVESTMENT_COLUMNS: &[(&str, &str, SemanticType)] = &[
    ("Asset ID + Name", "asset_id_plus_name", SemanticType::Text),
    ("Asset ID", "asset_id", SemanticType::Text),
    ("Portfolio Name", "portfolio_name", SemanticType::Text),
    ("Name - Reducd", "name_reduced", SemanticType::Text),
    ("Name - CHFA", "name_chfa", SemanticType::Text),
    ("Address", "address", SemanticType::Text),
    ("City", "city", SemanticType::Text),
    ("State", "state", SemanticType::Text),
    ("ZIP Code", "zip_code", SemanticType::Text),
    ("Address - Full", "address_full", SemanticType::Text),
    ("Unit Total", "unit_total", SemanticType::Integer),
    ("Units", "units", SemanticType::Integer),
    ("Comm Units", "comm_units", SemanticType::Integer),
    ("Beds", "beds", SemanticType::Integer),
    ("Baths", "baths", SemanticType::Decimal),
    ("Half Baths", "half_baths", SemanticType::Integer),
    ("Rooms", "rooms", SemanticType::Decimal),
    ("Property Type", "property_type", SemanticType::Text),
    ("Scope of Work - Orig", "scope_of_work", SemanticType::Text),
    ("New Const?", "new_construction", SemanticType::Boolean),
    ("Sect 8 Units?", "section_8_units", SemanticType::Boolean),
    ("PBV", "pbv", SemanticType::Text),
    ("Leasing Status - Initial", "leasing_status", SemanticType::Text),
    ("Owner LLC", "owner_llc", SemanticType::Text),
    ("Manager", "manager", SemanticType::Text),
    ("Owner LLC co", "owner_llc_co", SemanticType::Text),
    ("EIN", "ein", SemanticType::Text),
    ("Parcel ID", "parcel_id", SemanticType::Text),
    ("Census Tract", "census_tract", SemanticType::Text),
    ("Poverty - % Below", "poverty_pct_below", SemanticType::Percentage),
    ("Qualified Census Tract", "qualified_census_tract", SemanticType::Text),
    ("Walkscore", "walkscore", SemanticType::Integer),
    ("Proforma Revenue", "proforma_revenue", SemanticType::Currency),
    ("EGI", "egi", SemanticType::Currency),
    ("NOI", "noi", SemanticType::Currency),
    ("Going-in NOI", "going_in_noi", SemanticType::Currency),
    ("Going-In Cap Rate", "going_in_cap_rate", SemanticType::Percentage),
    (
        "Proforma Operating Expenses",
        "proforma_operating_expenses",
        SemanticType::Currency,
    ),
    ("Exp - Tax - Prop", "exp_tax_prop", SemanticType::Currency),
    ("Exp - Prop Ins.", "exp_prop_ins", SemanticType::Currency),
    ("Exp - Utilities", "exp_utilities", SemanticType::Currency),
    ("Exp - R&M", "exp_rm", SemanticType::Currency),
    ("Exp - Payroll", "exp_payroll", SemanticType::Currency),
    ("Exp - Garbage", "exp_garbage", SemanticType::Currency),
    ("Exp - PM Fee + Admin", "exp_pm_fee_admin", SemanticType::Currency),
    ("Purchase Price", "purchase_price", SemanticType::Currency),
    ("Down Payment", "down_payment", SemanticType::Currency),
    ("APPRAISED VALUE", "appraised_value", SemanticType::Currency),
    ("Date Of Last Appraisal", "date_of_last_appraisal", SemanticType::Date),
    ("Appraisal Firm", "appraisal_firm", SemanticType::Text),
    ("Assessed Value", "assessed_value", SemanticType::Currency),
    ("Assessment Date", "assessment_date", SemanticType::Date),
    ("Debt1 - Initial", "debt1_initial", SemanticType::Currency),
    ("Debt1 - Int Rate", "debt1_int_rate", SemanticType::Percentage),
    ("Maturity Date", "maturity_date", SemanticType::Date),
    ("LTV Ratio", "ltv_ratio", SemanticType::Percentage),
    ("DSV Ratio", "dsv_ratio", SemanticType::Percentage),
    ("Debt Service", "debt_service", SemanticType::Currency),
    ("Mortgage Holder", "mortgage_holder", SemanticType::Text),
    ("Built", "built", SemanticType::Integer),
    ("Renovated - Last", "renovated_last", SemanticType::Integer),
    ("Building SF", "building_sf", SemanticType::Integer),
    ("Building SF - Finished", "building_sf_finished", SemanticType::Integer),
    ("Unit SF - Avg", "unit_sf_avg", SemanticType::Integer),
    ("Land SF", "land_sf", SemanticType::Integer),
    ("Stories", "stories", SemanticType::Integer),
    ("Roof Type", "roof_type", SemanticType::Text),
    ("Roof Cover", "roof_cover", SemanticType::Text),
    ("Heat Fuel", "heat_fuel", SemanticType::Text),
    ("Heat Type", "heat_type", SemanticType::Text),
    ("Heat Sys Count", "heat_sys_count", SemanticType::Integer),
    ("Cooking Fuel", "cooking_fuel", SemanticType::Text),
    ("AC Type - Marketing", "ac_type", SemanticType::Text),
    ("AC Included", "ac_included", SemanticType::Boolean),
    ("Parking Spots Count", "parking_spots_count", SemanticType::Decimal),
    ("BR - 0", "br_0", SemanticType::Integer),
    ("BR - 1", "br_1", SemanticType::Integer),
    ("BR - 2", "br_2", SemanticType::Integer),
    ("BR - 3", "br_3", SemanticType::Integer),
    ("BR - 4", "br_4", SemanticType::Integer),
    (
        "Electric - Utility Company",
        "electric_utility_company",
        SemanticType::Text,
    ),
    ("Elect Account", "electric_account", SemanticType::Text),
    ("Gas - Utility Company", "gas_utility_company", SemanticType::Text),
    ("Gas Account", "gas_account", SemanticType::Text),
];
