//! Raw record parser for the tab-delimited sales export.
//!
//! The parser only splits lines into fields. It does not interpret them
//! beyond exposing the fixed column offsets and the `;` split used by
//! multi-valued columns.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::config::AlignmentPolicy;
use crate::error::{Error, Result};

/// Fixed column offsets of the export.
pub mod columns {
    pub const NAME: usize = 0;
    pub const ADDRESS: usize = 1;
    pub const CITY: usize = 2;
    pub const COUNTRY: usize = 3;
    pub const REGION: usize = 4;
    pub const PRODUCT_NAME: usize = 5;
    pub const PRODUCT_CATEGORY: usize = 6;
    pub const PRODUCT_CATEGORY_DESCRIPTION: usize = 7;
    pub const PRODUCT_UNIT_PRICE: usize = 8;
    pub const QUANTITY_ORDERED: usize = 9;
    pub const ORDER_DATE: usize = 10;

    /// Every data line must carry at least this many fields.
    pub const MIN_FIELDS: usize = 11;

    pub fn label(column: usize) -> &'static str {
        match column {
            NAME => "Name",
            ADDRESS => "Address",
            CITY => "City",
            COUNTRY => "Country",
            REGION => "Region",
            PRODUCT_NAME => "ProductName",
            PRODUCT_CATEGORY => "ProductCategory",
            PRODUCT_CATEGORY_DESCRIPTION => "ProductCategoryDescription",
            PRODUCT_UNIT_PRICE => "ProductUnitPrice",
            QUANTITY_ORDERED => "QuantityOrdered",
            ORDER_DATE => "OrderDate",
            _ => "unknown",
        }
    }
}

/// One data line of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    line: u64,
    fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, fields: Vec<String>) -> Result<Self> {
        if fields.len() < columns::MIN_FIELDS {
            return Err(Error::MalformedRecord {
                line,
                expected: columns::MIN_FIELDS,
                found: fields.len(),
            });
        }
        Ok(Self { line, fields })
    }

    /// 1-based line number in the source file (the header is line 1).
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn field(&self, column: usize) -> &str {
        &self.fields[column]
    }

    /// Values of a `;`-joined column.
    pub fn multi(&self, column: usize) -> Vec<&str> {
        self.fields[column].split(';').map(str::trim).collect()
    }

    /// Number of positions shared by the given multi-valued columns.
    ///
    /// Under `Truncate` this is the shortest list length; under `Strict`
    /// any length difference is an error.
    pub fn aligned_len(&self, policy: AlignmentPolicy, lists: &[(usize, &[&str])]) -> Result<usize> {
        let Some(&(first_col, first)) = lists.first() else {
            return Ok(0);
        };

        let mut shortest = first.len();
        for &(col, values) in &lists[1..] {
            if values.len() == first.len() {
                continue;
            }
            if policy == AlignmentPolicy::Strict {
                return Err(Error::MisalignedFields {
                    line: self.line,
                    field: columns::label(col),
                    len: values.len(),
                    sibling: columns::label(first_col),
                    sibling_len: first.len(),
                });
            }
            shortest = shortest.min(values.len());
        }

        if lists.iter().any(|(_, values)| values.len() > shortest) {
            warn!(
                line = self.line,
                kept = shortest,
                "multi-valued fields differ in length; trailing values dropped"
            );
        }
        Ok(shortest)
    }
}

/// Lazy iterator over the data lines of an export.
pub struct RecordReader<R> {
    inner: csv::Reader<R>,
    record: csv::ByteRecord,
}

impl RecordReader<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened sales export");
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn from_reader(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self {
            inner,
            record: csv::ByteRecord::new(),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.read_byte_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                let fields = self.record.iter().map(|raw| decode_field(raw, line)).collect();
                Some(RawRecord::new(line, fields))
            }
            Err(e) => Some(Err(Error::Csv(e))),
        }
    }
}

/// Decodes a field as UTF-8, falling back to Windows-1252 for legacy exports.
fn decode_field(raw: &[u8], line: u64) -> String {
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(raw) {
        return text.into_owned();
    }
    warn!(line, "field is not valid UTF-8; decoding as Windows-1252");
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(raw);
    text.into_owned()
}
