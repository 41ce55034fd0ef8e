//! CSV bulk import: header auto-mapping, value coercion and duplicate detection.
//!
//! Planning is pure; the handlers decide whether to persist the plan.

use crate::db::models::{Contact, ContactInput, Watch, WatchInput, WatchRecord};
use crate::error::AppError;
use crate::service::validation;
use crate::types::ContactType;
use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

/// Minimum similarity for a header to be mapped without an explicit mapping.
pub const MATCH_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Money,
    Date,
    Year,
    ContactType,
}

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Normalized spellings (lowercase alphanumerics).
    pub aliases: &'static [&'static str],
}

const fn field(
    name: &'static str,
    kind: FieldKind,
    aliases: &'static [&'static str],
) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        aliases,
    }
}

pub const WATCH_FIELDS: &[FieldSpec] = &[
    field("brand", FieldKind::Text, &["brand", "make", "manufacturer"]),
    field("model", FieldKind::Text, &["model", "modelname", "watch"]),
    field(
        "reference_number",
        FieldKind::Text,
        &["referencenumber", "reference", "ref", "refno", "refnumber"],
    ),
    field(
        "serial_number",
        FieldKind::Text,
        &["serialnumber", "serial", "serialno", "sn"],
    ),
    field("year", FieldKind::Year, &["year", "yearmade", "productionyear"]),
    field("condition", FieldKind::Text, &["condition", "grade"]),
    field(
        "accessories",
        FieldKind::Text,
        &["accessories", "boxpapers", "boxandpapers", "includes", "fullset"],
    ),
    field(
        "date_purchased",
        FieldKind::Date,
        &[
            "datepurchased",
            "purchasedate",
            "purchasedon",
            "buydate",
            "dateacquired",
            "datebought",
        ],
    ),
    field(
        "purchased_from",
        FieldKind::Text,
        &["purchasedfrom", "boughtfrom", "acquiredfrom", "source", "purchaseplatform"],
    ),
    field(
        "purchase_price",
        FieldKind::Money,
        &["purchaseprice", "cost", "buyprice", "pricepaid", "costbasis", "boughtfor"],
    ),
    field(
        "date_sold",
        FieldKind::Date,
        &["datesold", "solddate", "saledate", "soldon"],
    ),
    field(
        "sold_platform",
        FieldKind::Text,
        &["soldplatform", "saleplatform", "soldvia", "platform", "channel"],
    ),
    field(
        "price_sold",
        FieldKind::Money,
        &["pricesold", "saleprice", "soldprice", "soldfor", "salesprice"],
    ),
    field(
        "platform_fees",
        FieldKind::Money,
        &["platformfees", "fees", "fee", "commission"],
    ),
    field(
        "shipping_cost",
        FieldKind::Money,
        &["shippingcost", "shipping", "postage"],
    ),
    field("taxes", FieldKind::Money, &["taxes", "tax", "salestax"]),
    field(
        "accessories_cost",
        FieldKind::Money,
        &["accessoriescost", "accessorycost", "partscost", "servicecost"],
    ),
    field("notes", FieldKind::Text, &["notes", "note", "comments", "description"]),
];

pub const CONTACT_FIELDS: &[FieldSpec] = &[
    field(
        "first_name",
        FieldKind::Text,
        &["firstname", "first", "givenname", "fname"],
    ),
    field(
        "last_name",
        FieldKind::Text,
        &["lastname", "last", "surname", "familyname", "lname"],
    ),
    field("full_name", FieldKind::Text, &["name", "fullname", "contactname"]),
    field(
        "company",
        FieldKind::Text,
        &["company", "business", "organization", "dealer", "store"],
    ),
    field("email", FieldKind::Text, &["email", "emailaddress", "mail"]),
    field(
        "phone",
        FieldKind::Text,
        &["phone", "phonenumber", "mobile", "cell", "telephone", "tel"],
    ),
    field(
        "contact_type",
        FieldKind::ContactType,
        &["contacttype", "type", "category", "role"],
    ),
    field(
        "address_line1",
        FieldKind::Text,
        &["addressline1", "address", "address1", "street", "streetaddress"],
    ),
    field(
        "address_line2",
        FieldKind::Text,
        &["addressline2", "address2", "apt", "suite", "unit"],
    ),
    field("city", FieldKind::Text, &["city", "town"]),
    field("state", FieldKind::Text, &["state", "province", "region"]),
    field(
        "postal_code",
        FieldKind::Text,
        &["postalcode", "zip", "zipcode", "postcode"],
    ),
    field("country", FieldKind::Text, &["country"]),
    field("notes", FieldKind::Text, &["notes", "note", "comments"]),
];

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    /// Header -> field name. An empty field name ignores the column.
    #[serde(default)]
    pub mapping: Option<HashMap<String, String>>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub skip_duplicates: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowError {
    pub row: usize,
    pub field: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateRow {
    pub row: usize,
    /// `existing` when it matches a stored record, `file` for an earlier row.
    pub matches: &'static str,
}

/// Result of planning an import, before anything is written.
#[derive(Debug, Clone)]
pub struct ImportPlan<R> {
    /// Header -> field name, for every mapped column.
    pub mapping: BTreeMap<String, &'static str>,
    pub unmapped_columns: Vec<String>,
    pub accepted: Vec<(usize, R)>,
    pub duplicates: Vec<(DuplicateRow, R)>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub mapping: BTreeMap<String, &'static str>,
    pub unmapped_columns: Vec<String>,
    pub imported: usize,
    pub duplicates: Vec<DuplicateRow>,
    pub errors: Vec<RowError>,
    pub dry_run: bool,
}

impl<R> ImportPlan<R> {
    /// Records to insert, honoring `skip_duplicates`.
    pub fn into_records(self, skip_duplicates: bool) -> (Vec<R>, ImportReport) {
        let mut records: Vec<(usize, R)> = self.accepted;
        let mut dup_rows = Vec::with_capacity(self.duplicates.len());
        for (dup, rec) in self.duplicates {
            if !skip_duplicates {
                records.push((dup.row, rec));
            }
            dup_rows.push(dup);
        }
        records.sort_by_key(|(row, _)| *row);
        let report = ImportReport {
            mapping: self.mapping,
            unmapped_columns: self.unmapped_columns,
            imported: records.len(),
            duplicates: dup_rows,
            errors: self.errors,
            dry_run: false,
        };
        (records.into_iter().map(|(_, r)| r).collect(), report)
    }
}

/// Lowercase alphanumerics only: `"Ref. #"` -> `"ref"`.
pub fn normalize_header(h: &str) -> String {
    h.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Similarity in `[0, 1]` between two normalized strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let edit = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let contained = if short.chars().count() >= 4 && long.contains(short) {
        0.85
    } else {
        0.0
    };
    edit.max(contained)
}

fn field_score(header: &str, spec: &FieldSpec) -> f64 {
    spec.aliases
        .iter()
        .map(|alias| similarity(header, alias))
        .fold(0.0, f64::max)
}

/// Map each header to at most one field and each field to at most one header,
/// best scores first. Returns `column index -> field`.
pub fn auto_map(headers: &[String], fields: &'static [FieldSpec]) -> HashMap<usize, &'static FieldSpec> {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (col, header) in headers.iter().enumerate() {
        let norm = normalize_header(header);
        for (fi, spec) in fields.iter().enumerate() {
            let score = field_score(&norm, spec);
            if score >= MATCH_THRESHOLD {
                candidates.push((score, col, fi));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut used_fields = HashSet::new();
    let mut mapping = HashMap::new();
    for (_, col, fi) in candidates {
        if mapping.contains_key(&col) || used_fields.contains(&fi) {
            continue;
        }
        used_fields.insert(fi);
        mapping.insert(col, &fields[fi]);
    }
    mapping
}

fn explicit_map(
    headers: &[String],
    fields: &'static [FieldSpec],
    overrides: &HashMap<String, String>,
) -> Result<HashMap<usize, &'static FieldSpec>, AppError> {
    let mut mapping = auto_map(headers, fields);
    for (header, target) in overrides {
        let Some(col) = headers.iter().position(|h| h.trim() == header.trim()) else {
            return Err(AppError::validation(format!("mapping names unknown column {header:?}")));
        };
        let target = target.trim();
        if target.is_empty() {
            mapping.remove(&col);
            continue;
        }
        let Some(spec) = fields.iter().find(|f| f.name == target) else {
            return Err(AppError::validation(format!("mapping names unknown field {target:?}")));
        };
        // The explicit choice wins over whatever auto-mapping gave this field.
        mapping.retain(|_, f| f.name != spec.name);
        mapping.insert(col, spec);
    }
    Ok(mapping)
}

/// A bare amount with an optional currency symbol or ISO code on either side.
/// Thousands separators must be `,ddd` groups; comma decimals are not accepted.
static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[$€£]|[A-Za-z]{3})?\s*(?P<int>\d{1,3}(?:,\d{3})+|\d+)?(?P<frac>\.\d+)?\s*(?:[$€£]|[A-Za-z]{3})?$",
    )
    .expect("money regex")
});

/// Parse a money cell: `$1,234.50`, `USD 900`, `€ 12`, `900 usd`. Negative amounts are refused.
pub fn parse_money(raw: &str) -> Result<f64, String> {
    let s = raw.trim();
    if s.contains('-') || (s.starts_with('(') && s.ends_with(')')) {
        return Err("amount cannot be negative".to_string());
    }
    let not_amount = || format!("{raw:?} is not an amount");
    let caps = MONEY_RE.captures(s).ok_or_else(not_amount)?;
    let int = caps.name("int").map(|m| m.as_str().replace(',', ""));
    let frac = caps.name("frac").map(|m| m.as_str());
    if int.is_none() && frac.is_none() {
        return Err(not_amount());
    }
    format!("{}{}", int.as_deref().unwrap_or("0"), frac.unwrap_or(""))
        .parse()
        .map_err(|_| not_amount())
}

const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<i64> = 20_000..=80_000;

/// Drop a trailing time component: `2024-01-05 00:00:00` or `2024-01-05T10:00`.
/// A `T` only starts the time right after a digit, so `5-OCT-2024` is kept whole.
fn strip_time(s: &str) -> &str {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b' ' || (b == b'T' && i > 0 && bytes[i - 1].is_ascii_digit()) {
            return &s[..i];
        }
    }
    s
}

/// Parse the date shapes spreadsheets commonly export, into a `NaiveDate`.
pub fn parse_flexible_date(raw: &str) -> Result<NaiveDate, String> {
    let s = raw.trim();
    let err = || format!("{raw:?} is not a recognized date");

    // Excel day serials survive CSV export when the cell was not formatted.
    if s.chars().all(|c| c.is_ascii_digit())
        && let Ok(serial) = s.parse::<i64>()
        && EXCEL_SERIAL_RANGE.contains(&serial)
    {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or_else(err)?;
        return Ok(epoch + Duration::days(serial));
    }

    let date_part = strip_time(s);

    let parsed = if date_part.contains('/') {
        let parts: Vec<&str> = date_part.split('/').collect();
        match parts.as_slice() {
            [y, _, _] if y.len() == 4 => NaiveDate::parse_from_str(date_part, "%Y/%m/%d").ok(),
            [_, _, y] if y.len() == 2 => NaiveDate::parse_from_str(date_part, "%m/%d/%y").ok(),
            [_, _, y] if y.len() == 4 => NaiveDate::parse_from_str(date_part, "%m/%d/%Y").ok(),
            _ => None,
        }
    } else if date_part.contains('.') {
        NaiveDate::parse_from_str(date_part, "%d.%m.%Y").ok()
    } else {
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .ok()
            .or_else(|| NaiveDate::parse_from_str(s, "%b %d, %Y").ok())
            .or_else(|| NaiveDate::parse_from_str(s, "%B %d, %Y").ok())
            .or_else(|| NaiveDate::parse_from_str(date_part, "%d-%b-%Y").ok())
    };

    let date = parsed.ok_or_else(err)?;
    if !(1900..=2100).contains(&date.year()) {
        return Err(err());
    }
    Ok(date)
}

/// First run of four digits: `"1995"`, `"1995.0"`, `"circa 1960s"`.
pub fn parse_year(raw: &str) -> Result<i64, String> {
    let chars: Vec<char> = raw.chars().collect();
    chars
        .windows(4)
        .find(|w| w.iter().all(char::is_ascii_digit))
        .and_then(|w| w.iter().collect::<String>().parse().ok())
        .ok_or_else(|| format!("{raw:?} is not a year"))
}

/// Coerced cell values of one data row, keyed by field name.
#[derive(Debug, Default)]
pub struct RowValues {
    text: HashMap<&'static str, String>,
    money: HashMap<&'static str, f64>,
    dates: HashMap<&'static str, NaiveDate>,
    years: HashMap<&'static str, i64>,
    contact_type: Option<ContactType>,
}

impl RowValues {
    fn text(&self, field: &str) -> Option<String> {
        self.text.get(field).cloned()
    }

    fn money(&self, field: &str) -> Option<f64> {
        self.money.get(field).copied()
    }

    fn date(&self, field: &str) -> Option<String> {
        self.dates.get(field).map(|d| d.format("%Y-%m-%d").to_string())
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.money.is_empty()
            && self.dates.is_empty()
            && self.years.is_empty()
            && self.contact_type.is_none()
    }
}

/// A record type the importer can produce.
pub trait Importable: Sized {
    const ENTITY: &'static str;

    fn fields() -> &'static [FieldSpec];

    fn from_values(values: &RowValues) -> Result<Self, String>;

    /// Key under which two records count as the same real-world item.
    fn duplicate_key(&self) -> Option<String>;
}

pub fn watch_key(
    serial: Option<&str>,
    brand: &str,
    model: &str,
    reference: Option<&str>,
    purchased: Option<NaiveDate>,
) -> String {
    match serial.map(str::trim).filter(|s| !s.is_empty()) {
        Some(serial) => format!("serial:{}", serial.to_lowercase()),
        None => format!(
            "item:{}|{}|{}|{}",
            brand.trim().to_lowercase(),
            model.trim().to_lowercase(),
            reference.unwrap_or("").trim().to_lowercase(),
            purchased.map(|d| d.to_string()).unwrap_or_default()
        ),
    }
}

pub fn existing_watch_keys(watches: &[Watch]) -> HashSet<String> {
    watches
        .iter()
        .map(|w| {
            watch_key(
                w.serial_number.as_deref(),
                &w.brand,
                &w.model,
                w.reference_number.as_deref(),
                w.date_purchased,
            )
        })
        .collect()
}

impl Importable for WatchRecord {
    const ENTITY: &'static str = "watch";

    fn fields() -> &'static [FieldSpec] {
        WATCH_FIELDS
    }

    fn from_values(v: &RowValues) -> Result<Self, String> {
        let input = WatchInput {
            brand: v.text("brand").unwrap_or_default(),
            model: v.text("model").unwrap_or_default(),
            reference_number: v.text("reference_number"),
            serial_number: v.text("serial_number"),
            year: v.years.get("year").copied(),
            condition: v.text("condition"),
            accessories: v.text("accessories"),
            date_purchased: v.date("date_purchased"),
            purchased_from: v.text("purchased_from"),
            purchase_price: v.money("purchase_price"),
            seller_contact_id: None,
            date_sold: v.date("date_sold"),
            sold_platform: v.text("sold_platform"),
            price_sold: v.money("price_sold"),
            buyer_contact_id: None,
            platform_fees: v.money("platform_fees"),
            shipping_cost: v.money("shipping_cost"),
            taxes: v.money("taxes"),
            accessories_cost: v.money("accessories_cost"),
            notes: v.text("notes"),
        };
        validation::validate_watch(input).map_err(|e| e.to_string())
    }

    fn duplicate_key(&self) -> Option<String> {
        Some(watch_key(
            self.serial_number.as_deref(),
            &self.brand,
            &self.model,
            self.reference_number.as_deref(),
            self.date_purchased,
        ))
    }
}

fn contact_key_parts(
    email: Option<&str>,
    first: Option<&str>,
    last: Option<&str>,
    company: Option<&str>,
    phone: Option<&str>,
) -> Option<String> {
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        return Some(format!("email:{}", email.to_lowercase()));
    }
    let name = [first, last]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let name = if name.is_empty() {
        company?.trim().to_lowercase()
    } else {
        name
    };
    let phone: String = phone
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    Some(format!("name:{name}|{phone}"))
}

pub fn existing_contact_keys(contacts: &[Contact]) -> HashSet<String> {
    contacts
        .iter()
        .filter_map(|c| {
            contact_key_parts(
                c.email.as_deref(),
                c.first_name.as_deref(),
                c.last_name.as_deref(),
                c.company.as_deref(),
                c.phone.as_deref(),
            )
        })
        .collect()
}

impl Importable for ContactInput {
    const ENTITY: &'static str = "contact";

    fn fields() -> &'static [FieldSpec] {
        CONTACT_FIELDS
    }

    fn from_values(v: &RowValues) -> Result<Self, String> {
        let mut first_name = v.text("first_name");
        let mut last_name = v.text("last_name");
        if first_name.is_none()
            && last_name.is_none()
            && let Some(full) = v.text("full_name")
        {
            match full.trim().rsplit_once(' ') {
                Some((first, last)) => {
                    first_name = Some(first.trim().to_string());
                    last_name = Some(last.trim().to_string());
                }
                None => first_name = Some(full),
            }
        }
        let input = ContactInput {
            first_name,
            last_name,
            company: v.text("company"),
            email: v.text("email"),
            phone: v.text("phone"),
            contact_type: v.contact_type,
            address_line1: v.text("address_line1"),
            address_line2: v.text("address_line2"),
            city: v.text("city"),
            state: v.text("state"),
            postal_code: v.text("postal_code"),
            country: v.text("country"),
            notes: v.text("notes"),
        };
        validation::validate_contact(input).map_err(|e| e.to_string())
    }

    fn duplicate_key(&self) -> Option<String> {
        contact_key_parts(
            self.email.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.company.as_deref(),
            self.phone.as_deref(),
        )
    }
}

fn read_csv(text: &str) -> Result<(Vec<String>, Vec<csv::StringRecord>), AppError> {
    // Spreadsheet exports often start with a UTF-8 BOM.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::validation("CSV has no header row"));
    }
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((headers, rows))
}

fn coerce_row(
    record: &csv::StringRecord,
    mapping: &HashMap<usize, &'static FieldSpec>,
    row: usize,
) -> Result<RowValues, RowError> {
    let mut values = RowValues::default();
    for (&col, spec) in mapping {
        let Some(raw) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let fail = |message: String| RowError {
            row,
            field: Some(spec.name),
            message,
        };
        match spec.kind {
            FieldKind::Text => {
                values.text.insert(spec.name, raw.to_string());
            }
            FieldKind::Money => {
                values.money.insert(spec.name, parse_money(raw).map_err(fail)?);
            }
            FieldKind::Date => {
                values
                    .dates
                    .insert(spec.name, parse_flexible_date(raw).map_err(fail)?);
            }
            FieldKind::Year => {
                values.years.insert(spec.name, parse_year(raw).map_err(fail)?);
            }
            FieldKind::ContactType => {
                let kind = raw
                    .parse::<ContactType>()
                    .map_err(|e| fail(e.to_string()))?;
                values.contact_type = Some(kind);
            }
        }
    }
    Ok(values)
}

/// Turn CSV text into an import plan for `R`, checking duplicates against
/// `existing` keys and against earlier rows of the same file.
pub fn plan_import<R: Importable>(
    csv_text: &str,
    overrides: Option<&HashMap<String, String>>,
    existing: &HashSet<String>,
) -> Result<ImportPlan<R>, AppError> {
    let (headers, rows) = read_csv(csv_text)?;
    let mapping = match overrides {
        Some(o) => explicit_map(&headers, R::fields(), o)?,
        None => auto_map(&headers, R::fields()),
    };
    if mapping.is_empty() {
        return Err(AppError::validation(format!(
            "No columns could be matched to {} fields",
            R::ENTITY
        )));
    }

    let mut plan = ImportPlan {
        mapping: mapping
            .iter()
            .map(|(&col, spec)| (headers[col].clone(), spec.name))
            .collect(),
        unmapped_columns: headers
            .iter()
            .enumerate()
            .filter(|(col, h)| !mapping.contains_key(col) && !h.is_empty())
            .map(|(_, h)| h.clone())
            .collect(),
        accepted: Vec::new(),
        duplicates: Vec::new(),
        errors: Vec::new(),
    };

    let mut seen: HashSet<String> = HashSet::new();
    for (idx, record) in rows.iter().enumerate() {
        let row = idx + 1;
        let values = match coerce_row(record, &mapping, row) {
            Ok(v) => v,
            Err(e) => {
                plan.errors.push(e);
                continue;
            }
        };
        if values.is_empty() {
            continue;
        }
        let rec = match R::from_values(&values) {
            Ok(r) => r,
            Err(message) => {
                plan.errors.push(RowError {
                    row,
                    field: None,
                    message,
                });
                continue;
            }
        };
        match rec.duplicate_key() {
            Some(key) if existing.contains(&key) => plan.duplicates.push((
                DuplicateRow {
                    row,
                    matches: "existing",
                },
                rec,
            )),
            Some(key) if !seen.insert(key.clone()) => plan.duplicates.push((
                DuplicateRow {
                    row,
                    matches: "file",
                },
                rec,
            )),
            _ => plan.accepted.push((row, rec)),
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(hs: &[&str]) -> Vec<String> {
        hs.iter().map(|h| h.to_string()).collect()
    }

    fn suggest_mapping(headers: &[String], fields: &'static [FieldSpec]) -> BTreeMap<String, &'static str> {
        auto_map(headers, fields)
            .into_iter()
            .map(|(col, spec)| (headers[col].clone(), spec.name))
            .collect()
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("brand", "brand"), 1.0);
        assert_eq!(similarity("", "brand"), 0.0);
        assert!(similarity("serialnumbr", "serialnumber") > MATCH_THRESHOLD);
        assert!(similarity("firstname", "lastname") < MATCH_THRESHOLD);
    }

    #[test]
    fn maps_typical_spreadsheet_headers() {
        let h = headers(&[
            "Brand",
            "Model",
            "Ref #",
            "Serial No.",
            "Purchase Date",
            "Cost",
            "Sale Date",
            "Sold For",
            "Fees",
            "Shipping",
            "Sales Tax",
            "Whatever",
        ]);
        let m = suggest_mapping(&h, WATCH_FIELDS);
        assert_eq!(m["Brand"], "brand");
        assert_eq!(m["Ref #"], "reference_number");
        assert_eq!(m["Serial No."], "serial_number");
        assert_eq!(m["Purchase Date"], "date_purchased");
        assert_eq!(m["Cost"], "purchase_price");
        assert_eq!(m["Sale Date"], "date_sold");
        assert_eq!(m["Sold For"], "price_sold");
        assert_eq!(m["Fees"], "platform_fees");
        assert_eq!(m["Shipping"], "shipping_cost");
        assert_eq!(m["Sales Tax"], "taxes");
        assert!(!m.contains_key("Whatever"));
    }

    #[test]
    fn each_field_is_claimed_once() {
        let h = headers(&["Notes", "Comments"]);
        let m = suggest_mapping(&h, WATCH_FIELDS);
        assert_eq!(m.len(), 1);
        assert_eq!(m["Notes"], "notes");
    }

    #[test]
    fn typo_headers_still_map() {
        let m = suggest_mapping(&headers(&["Seral Number", "Purchse Price"]), WATCH_FIELDS);
        assert_eq!(m["Seral Number"], "serial_number");
        assert_eq!(m["Purchse Price"], "purchase_price");
    }

    #[test]
    fn money_coercion() {
        assert_eq!(parse_money("$1,234.50"), Ok(1234.5));
        assert_eq!(parse_money("USD 900"), Ok(900.0));
        assert_eq!(parse_money(" 12 "), Ok(12.0));
        assert_eq!(parse_money("900 usd"), Ok(900.0));
        assert_eq!(parse_money("£12,000"), Ok(12000.0));
        assert_eq!(parse_money(".50"), Ok(0.5));
        assert!(parse_money("(12.00)").is_err());
        assert!(parse_money("-5").is_err());
        assert!(parse_money("$-5").is_err());
        assert!(parse_money("USD -900").is_err());
        assert!(parse_money("1.234,50").is_err());
        assert!(parse_money("12,5").is_err());
        assert!(parse_money("1,23,456").is_err());
        assert!(parse_money("12 watches").is_err());
        assert!(parse_money("$").is_err());
        assert!(parse_money("n/a").is_err());
    }

    #[test]
    fn date_coercion() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(parse_flexible_date("2024-03-05"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("3/5/2024"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("03/05/24"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("2024/03/05"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("05.03.2024"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("2024-03-05 00:00:00"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("Mar 5, 2024"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("2024-03-05T10:30:00Z"), Ok(d(2024, 3, 5)));
        assert_eq!(parse_flexible_date("5-OCT-2024"), Ok(d(2024, 10, 5)));
        assert_eq!(parse_flexible_date("05-Sep-2024"), Ok(d(2024, 9, 5)));
        assert_eq!(parse_flexible_date("45356"), Ok(d(2024, 3, 5)));
        assert!(parse_flexible_date("13/45/2024").is_err());
        assert!(parse_flexible_date("soon").is_err());
    }

    #[test]
    fn year_coercion() {
        assert_eq!(parse_year("1995"), Ok(1995));
        assert_eq!(parse_year("1995.0"), Ok(1995));
        assert_eq!(parse_year("circa 1960s"), Ok(1960));
        assert!(parse_year("60s").is_err());
    }

    #[test]
    fn plans_rows_errors_and_duplicates() {
        let csv = "Brand,Model,Serial,Purchase Price,Date Purchased\n\
                   Rolex,Submariner,ABC123,\"$9,500\",2024-01-10\n\
                   Omega,Speedmaster,,4200,01/15/2024\n\
                   ,Nautilus,,1,2024-01-01\n\
                   Rolex,Submariner,abc123,9500,2024-01-10\n\
                   Tudor,Black Bay,XYZ9,bad,2024-02-01\n\
                   Cartier,Tank,OLD1,2000,2023-05-05\n";
        let existing: HashSet<String> =
            [watch_key(Some("old1"), "Cartier", "Tank", None, None)].into();
        let plan = plan_import::<WatchRecord>(csv, None, &existing).unwrap();

        let accepted: Vec<usize> = plan.accepted.iter().map(|(r, _)| *r).collect();
        assert_eq!(accepted, vec![1, 2]);
        assert_eq!(plan.accepted[0].1.purchase_price, Some(9500.0));
        assert_eq!(
            plan.accepted[1].1.date_purchased,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );

        let dups: Vec<(usize, &str)> = plan
            .duplicates
            .iter()
            .map(|(d, _)| (d.row, d.matches))
            .collect();
        assert_eq!(dups, vec![(4, "file"), (6, "existing")]);

        assert_eq!(plan.errors.len(), 2);
        assert_eq!(plan.errors[0].row, 3);
        assert_eq!(plan.errors[0].field, None);
        assert_eq!(plan.errors[1].row, 5);
        assert_eq!(plan.errors[1].field, Some("purchase_price"));

        let (records, report) = plan.into_records(true);
        assert_eq!(records.len(), 2);
        assert_eq!(report.imported, 2);
        assert_eq!(report.duplicates.len(), 2);
    }

    #[test]
    fn duplicates_can_be_kept() {
        let csv = "brand,model,serial\nRolex,GMT,S1\nRolex,GMT,S1\n";
        let plan = plan_import::<WatchRecord>(csv, None, &HashSet::new()).unwrap();
        let (records, report) = plan.into_records(false);
        assert_eq!(records.len(), 2);
        assert_eq!(report.duplicates.len(), 1);
    }

    #[test]
    fn explicit_mapping_overrides_and_ignores() {
        let csv = "Maker,Piece,Notes\nIWC,Portugieser,keep out\n";
        let overrides: HashMap<String, String> = [
            ("Maker".to_string(), "brand".to_string()),
            ("Piece".to_string(), "model".to_string()),
            ("Notes".to_string(), String::new()),
        ]
        .into();
        let plan = plan_import::<WatchRecord>(csv, Some(&overrides), &HashSet::new()).unwrap();
        assert_eq!(plan.unmapped_columns, vec!["Notes".to_string()]);
        assert_eq!(plan.accepted[0].1.brand, "IWC");
        assert_eq!(plan.accepted[0].1.notes, None);

        let bad: HashMap<String, String> = [("Maker".to_string(), "maker".to_string())].into();
        assert!(plan_import::<WatchRecord>(csv, Some(&bad), &HashSet::new()).is_err());
    }

    #[test]
    fn contacts_split_full_names_and_dedupe_by_email() {
        let csv = "\u{feff}Name,E-mail,Type,Phone\n\
                   Ada Lovelace,ada@example.com,Watch Trader,555-0100\n\
                   Ada L.,ADA@example.com,Customer,\n\
                   Grace Hopper,,jeweller,(555) 0101\n\
                   Nobody,,astronaut,\n";
        let plan = plan_import::<ContactInput>(csv, None, &HashSet::new()).unwrap();
        assert_eq!(plan.accepted.len(), 2);
        let ada = &plan.accepted[0].1;
        assert_eq!(ada.first_name.as_deref(), Some("Ada"));
        assert_eq!(ada.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(ada.contact_type, Some(ContactType::WatchTrader));
        assert_eq!(plan.accepted[1].1.contact_type, Some(ContactType::Jeweler));
        assert_eq!(plan.duplicates.len(), 1);
        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].field, Some("contact_type"));
    }

    #[test]
    fn unmatched_headers_are_rejected() {
        let err = plan_import::<WatchRecord>("foo,bar\n1,2\n", None, &HashSet::new());
        assert!(err.is_err());
    }
}
