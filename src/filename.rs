//! Destination filename resolution for publisher download links
//!
//! Publisher URLs rarely end in a usable filename: PDF endpoints have no
//! extension, signed CDN links carry expiring query strings, supplement
//! actions hide the real name behind a `file=` parameter. [`resolve_filename`]
//! applies a fixed, ordered list of corrections; the first matching rule wins.
//! Several markers are prefixes of others, so the order is significant.

/// Filename used when a URL has no usable final segment
const FALLBACK_FILENAME: &str = "download";

/// Final path segment of a URL-like string, ignoring trailing slashes
fn base(s: &str) -> &str {
    let trimmed = s.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Remove everything from the first `start` up to and including the last `end` after it
fn strip_span(name: &str, start: &str, end: &str) -> String {
    if let Some(from) = name.find(start)
        && let Some(rel) = name[from..].rfind(end)
    {
        let to = from + rel + end.len();
        return format!("{}{}", &name[..from], &name[to..]);
    }
    name.to_string()
}

fn is_supplement_action(url: &str) -> bool {
    url.contains("/action/downloadSupplement?")
}

fn is_doi_pdf(url: &str) -> bool {
    ["com/doi/pdf/", "org/doi/pdf/", "org/doi/pdfdirect/"]
        .iter()
        .any(|marker| url.contains(marker))
}

fn has_md5_pid(url: &str) -> bool {
    url.find("?md5=")
        .is_some_and(|idx| url[idx..].contains("&pid="))
}

/// Map a source URL to a local filename.
///
/// The result is never empty and never contains a path separator.
///
/// # Examples
///
/// ```
/// use scifetch::filename::resolve_filename;
///
/// assert_eq!(
///     resolve_filename("https://example.org/doi/pdf/10.1000/xyz?articleTools=true"),
///     "xyz.pdf"
/// );
/// assert_eq!(
///     resolve_filename("https://ftp.ncbi.nlm.nih.gov/geo/series/GSE1nnn/GSE1000/matrix/GSE1000_series_matrix.txt.gz"),
///     "GSE1000_series_matrix.txt.gz"
/// );
/// ```
#[must_use]
pub fn resolve_filename(url: &str) -> String {
    let fname = base(url);

    let resolved = if url.contains("/pdfExtended/") {
        format!("{fname}.pdf")
    } else if url.contains("showPdf?pii=") {
        format!("{}.pdf", base(&url.replace("showPdf?pii=", "")))
    } else if url.contains("track/pdf") {
        format!("{fname}.pdf")
    } else if url.contains("&type=printable") {
        format!("{}.pdf", fname.replace("&type=printable", ""))
    } else if fname == "pdf" {
        base(&url.replace("/pdf", ".pdf")).to_string()
    } else if let Some(idx) = fname.find("?Expires=") {
        fname[..idx].to_string()
    } else if is_supplement_action(url) {
        strip_span(fname, "downloadSupplement", "file=")
    } else if is_doi_pdf(url) {
        format!("{}.pdf", fname.replace("?articleTools=true", ""))
    } else if has_md5_pid(url) {
        strip_span(fname, "?md5=", "&pid=")
    } else if let Some(stripped) = fname.strip_suffix("?download=true") {
        stripped.to_string()
    } else {
        fname.to_string()
    };

    sanitize(resolved)
}

fn sanitize(name: String) -> String {
    let name = name.replace(['/', '\\'], "_");
    if name.is_empty() || name == "." || name == ".." {
        return FALLBACK_FILENAME.to_string();
    }
    name
}
