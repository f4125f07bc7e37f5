use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source kinds
// ---------------------------------------------------------------------------

/// Every source kind the pipeline can ingest from.
///
/// The legacy spellings (`upload`, `pdf`, `docx`, `others_upload`) are still
/// accepted on input so older trigger payloads keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Api,
    Scraping,
    #[serde(alias = "upload")]
    CsvUpload,
    JsonUpload,
    XlsxUpload,
    #[serde(alias = "pdf")]
    PdfUpload,
    #[serde(alias = "docx")]
    DocxUpload,
    XmlUpload,
    ParquetUpload,
    ZipUpload,
    #[serde(alias = "others_upload")]
    UniversalUpload,
}

impl SourceType {
    pub const ALL: [SourceType; 11] = [
        SourceType::Api,
        SourceType::Scraping,
        SourceType::CsvUpload,
        SourceType::JsonUpload,
        SourceType::XlsxUpload,
        SourceType::PdfUpload,
        SourceType::DocxUpload,
        SourceType::XmlUpload,
        SourceType::ParquetUpload,
        SourceType::ZipUpload,
        SourceType::UniversalUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Scraping => "scraping",
            Self::CsvUpload => "csv_upload",
            Self::JsonUpload => "json_upload",
            Self::XlsxUpload => "xlsx_upload",
            Self::PdfUpload => "pdf_upload",
            Self::DocxUpload => "docx_upload",
            Self::XmlUpload => "xml_upload",
            Self::ParquetUpload => "parquet_upload",
            Self::ZipUpload => "zip_upload",
            Self::UniversalUpload => "universal_upload",
        }
    }

    /// True for sources that arrive as an uploaded file.
    pub fn is_upload(&self) -> bool {
        !self.is_network()
    }

    /// True for sources fetched over the network (subject to the run budget).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Api | Self::Scraping)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let found = match key.as_str() {
            "upload" | "csv" => Some(Self::CsvUpload),
            "pdf" => Some(Self::PdfUpload),
            "docx" => Some(Self::DocxUpload),
            "others_upload" | "universal" => Some(Self::UniversalUpload),
            other => Self::ALL.iter().copied().find(|t| t.as_str() == other),
        };
        found.ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
            format!("unknown source type '{}' (known: {})", s, known.join(", "))
        })
    }
}

// ---------------------------------------------------------------------------
// Trigger request
// ---------------------------------------------------------------------------

/// An uploaded file: the original file name plus its bytes.
#[derive(Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Lower-cased extension without the dot, or `""`.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// What the external API layer hands to the pipeline for one run.
#[derive(Clone)]
pub struct TriggerRequest {
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub api_key: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub file: Option<UploadedFile>,
}

impl TriggerRequest {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            source_url: None,
            api_key: None,
            start_date: None,
            end_date: None,
            file: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Human-readable origin of the data: file name or URL.
    pub fn origin(&self) -> String {
        if let Some(ref file) = self.file {
            return file.name.clone();
        }
        self.source_url.clone().unwrap_or_default()
    }
}

// Never print the API key.
impl fmt::Debug for TriggerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRequest")
            .field("source_type", &self.source_type)
            .field("source_url", &self.source_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .field("file", &self.file)
            .finish()
    }
}
