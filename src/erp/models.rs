//! Wire types for the Business Central OData surface.
//!
//! Collections arrive under a top-level `value` array. Field names carry the
//! ERP's quirks verbatim, including URL-encoded leading digits
//! (`_x0031_st_Check_Date` is "1st Check Date") and `@odata.etag` concurrency
//! tokens. Everything defaults to empty so partially filled rows still parse.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// OData collection envelope: `{"value": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct ODataCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Job-list metadata row, including first/second-check bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobListEntry {
    #[serde(rename = "@odata.etag", default, skip_serializing)]
    pub etag: String,
    #[serde(rename = "Job_No", default)]
    pub job_no: String,
    #[serde(rename = "Description", default)]
    pub job_title: String,
    #[serde(rename = "Bill_to_Name", default)]
    pub customer_name: String,
    #[serde(rename = "_x0031_st_Check_Date", default)]
    pub first_check_date: String,
    #[serde(rename = "_x0031_st_Check_By", default)]
    pub first_check_by: String,
    #[serde(rename = "_x0032_nd_Check_Date", default)]
    pub second_check_date: String,
    #[serde(rename = "_x0032_nd_Check_Time", default)]
    pub second_check_time: String,
    #[serde(rename = "_x0032_nd_Check_By", default)]
    pub second_check_by: String,
    #[serde(rename = "Verification_Comment", default)]
    pub verification_comment: String,
}

/// Accounting record anchoring a job's financial activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobLedgerEntry {
    #[serde(rename = "Entry_No", default)]
    pub entry_no: i64,
    #[serde(rename = "Job_No", default)]
    pub job_no: String,
    #[serde(rename = "Posting_Date", default)]
    pub posting_date: String,
    /// Source document number; references the sales quote when present.
    #[serde(rename = "Document_No", default)]
    pub document_no: String,
    /// Posted sales invoice number when one is referenced.
    #[serde(rename = "Invoice_No", default)]
    pub invoice_no: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Quantity", default)]
    pub quantity: f64,
    #[serde(rename = "Unit_Cost", default)]
    pub unit_cost: f64,
    #[serde(rename = "Total_Cost", default)]
    pub total_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesQuoteHeader {
    #[serde(rename = "No", default)]
    pub no: String,
    #[serde(rename = "Sell_to_Customer_Name", default)]
    pub customer_name: String,
    #[serde(rename = "Document_Date", default)]
    pub document_date: String,
    #[serde(rename = "External_Document_No", default)]
    pub external_document_no: String,
    #[serde(rename = "Amount", default)]
    pub amount: f64,
    #[serde(rename = "Amount_Including_VAT", default)]
    pub amount_including_vat: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesQuoteLine {
    #[serde(rename = "Document_No", default)]
    pub document_no: String,
    #[serde(rename = "Line_No", default)]
    pub line_no: i64,
    #[serde(rename = "No", default)]
    pub item_no: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Quantity", default)]
    pub quantity: f64,
    #[serde(rename = "Unit_Price", default)]
    pub unit_price: f64,
    #[serde(rename = "Line_Amount", default)]
    pub line_amount: f64,
}

/// Quote header with its lines, fetched together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesQuote {
    pub header: SalesQuoteHeader,
    pub lines: Vec<SalesQuoteLine>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesInvoiceHeader {
    #[serde(rename = "No", default)]
    pub no: String,
    #[serde(rename = "Sell_to_Customer_Name", default)]
    pub customer_name: String,
    #[serde(rename = "Posting_Date", default)]
    pub posting_date: String,
    #[serde(rename = "Amount", default)]
    pub amount: f64,
    #[serde(rename = "Amount_Including_VAT", default)]
    pub amount_including_vat: f64,
}

/// Attachment row: URLs arrive as one comma-separated string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobAttachmentLinks {
    #[serde(rename = "Job_No", default)]
    pub job_no: String,
    #[serde(rename = "Attachment_Links", default)]
    pub attachment_links: String,
}

impl JobAttachmentLinks {
    /// Split the comma-separated field into clean URLs.
    pub fn urls(&self) -> Vec<String> {
        self.attachment_links
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .collect()
    }
}

/// A downloaded attachment with the metadata the document store needs.
#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Structured reference data handed to the verification model, serialized as
/// the `erpBundles` object tree.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceBundles {
    pub job_no: String,
    pub ledger_entry: JobLedgerEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_quote: Option<SalesQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_invoice: Option<SalesInvoiceHeader>,
}

/// Second-check fields posted back to the ERP on a clean pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFields {
    /// YYYY-MM-DD, local time
    pub date: String,
    /// HH:MM:SS, local time
    pub time: String,
    pub checker: String,
    pub comment: String,
}

impl VerificationFields {
    /// PATCH body with the ERP's field names.
    pub fn to_patch_body(&self) -> serde_json::Value {
        serde_json::json!({
            "_x0032_nd_Check_Date": self.date,
            "_x0032_nd_Check_Time": self.time,
            "_x0032_nd_Check_By": self.checker,
            "Verification_Comment": self.comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encoded_check_fields() {
        let raw = r#"{
            "@odata.etag": "W/\"JzQ0O0pxTDlBJw==\"",
            "Job_No": "J069026",
            "Description": "Pump overhaul",
            "Bill_to_Name": "Contoso Ltd",
            "_x0031_st_Check_Date": "2024-01-10",
            "_x0032_nd_Check_By": ""
        }"#;
        let entry: JobListEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.job_no, "J069026");
        assert_eq!(entry.first_check_date, "2024-01-10");
        assert!(entry.second_check_by.is_empty());
        assert!(entry.etag.starts_with("W/"));
    }

    #[test]
    fn collection_envelope_defaults_to_empty() {
        let empty: ODataCollection<JobLedgerEntry> = serde_json::from_str("{}").unwrap();
        assert!(empty.value.is_empty());

        let one: ODataCollection<JobLedgerEntry> =
            serde_json::from_str(r#"{"value": [{"Entry_No": 7, "Job_No": "J1"}]}"#).unwrap();
        assert_eq!(one.value.len(), 1);
        assert_eq!(one.value[0].entry_no, 7);
    }

    #[test]
    fn attachment_links_split_and_trim() {
        let links = JobAttachmentLinks {
            job_no: "J1".to_string(),
            attachment_links: " https://sp.example/a.pdf , https://sp.example/b.pdf ,,".to_string(),
        };
        assert_eq!(
            links.urls(),
            vec![
                "https://sp.example/a.pdf".to_string(),
                "https://sp.example/b.pdf".to_string()
            ]
        );
        assert!(JobAttachmentLinks::default().urls().is_empty());
    }

    #[test]
    fn patch_body_uses_erp_field_names() {
        let fields = VerificationFields {
            date: "2024-01-11".to_string(),
            time: "09:30:00".to_string(),
            checker: "AI LLM Service".to_string(),
            comment: "Job J1 passed verification with no discrepancies.".to_string(),
        };
        let body = fields.to_patch_body();
        assert_eq!(body["_x0032_nd_Check_Date"], "2024-01-11");
        assert_eq!(body["_x0032_nd_Check_By"], "AI LLM Service");
    }

    #[test]
    fn bundles_serialize_camel_case() {
        let bundles = ReferenceBundles {
            job_no: "J1".to_string(),
            ..ReferenceBundles::default()
        };
        let value = serde_json::to_value(&bundles).unwrap();
        assert_eq!(value["jobNo"], "J1");
        assert!(value["ledgerEntry"].is_object());
        assert!(value.get("salesQuote").is_none());
    }
}
