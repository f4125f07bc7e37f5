// Shared plumbing for file upload adapters

use trustgrid_core::{IngestError, RawCapture, RunContext, TriggerRequest, UploadedFile};

use crate::sniff::{sniff, Signature};

/// The uploaded file, or `InvalidRequest` when the trigger carried none.
pub(crate) fn uploaded(req: &TriggerRequest) -> Result<&UploadedFile, IngestError> {
    req.file.as_ref().ok_or_else(|| {
        IngestError::InvalidRequest(format!("{} requires an uploaded file", req.source_type))
    })
}

/// Extension + content gate. A file without an extension is judged on its
/// content alone.
pub(crate) fn check_format(
    file: &UploadedFile,
    extensions: &[&str],
    accepted: &[Signature],
) -> Result<Signature, IngestError> {
    let ext = file.extension();
    if !ext.is_empty() && !extensions.contains(&ext.as_str()) {
        return Err(IngestError::UnsupportedFormat(format!(
            "'{}': extension .{} not accepted (expected one of: {})",
            file.name,
            ext,
            extensions.join(", ")
        )));
    }
    let sig = sniff(&file.bytes);
    if sig == Signature::Empty {
        return Err(IngestError::ParseFailure(format!("'{}' is empty", file.name)));
    }
    if !accepted.contains(&sig) {
        return Err(IngestError::UnsupportedFormat(format!(
            "'{}': content looks like {:?}, not a .{} file",
            file.name,
            sig,
            extensions.first().copied().unwrap_or("?")
        )));
    }
    tracing::debug!(file = %file.name, signature = ?sig, "format accepted");
    Ok(sig)
}

pub(crate) fn capture(
    req: &TriggerRequest,
    ctx: &RunContext<'_>,
    file: &UploadedFile,
    media_type: &str,
) -> RawCapture {
    RawCapture::new(
        req.source_type,
        file.name.clone(),
        ctx.now(),
        Some(media_type.to_string()),
        file.bytes.clone(),
    )
}
