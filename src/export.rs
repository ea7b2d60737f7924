//! How each Drive MIME type is brought to disk.
//!
//! Binary files are downloaded as-is. Editor documents (the
//! `application/vnd.google-apps.*` family) have no byte representation and
//! are exported to an Office or image format instead.

/// Namespace prefix shared by all editor-native MIME types.
pub const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";

pub const SPREADSHEET: &str = "application/vnd.google-apps.spreadsheet";
pub const DOCUMENT: &str = "application/vnd.google-apps.document";
pub const PRESENTATION: &str = "application/vnd.google-apps.presentation";
pub const DRAWING: &str = "application/vnd.google-apps.drawing";
pub const JAM: &str = "application/vnd.google-apps.jam";
pub const SHORTCUT: &str = "application/vnd.google-apps.shortcut";

/// Target of an editor document export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl ExportFormat {
    /// Local file name for an exported document: `name.ext`.
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.extension)
    }
}

pub const XLSX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    extension: "xlsx",
};

pub const DOCX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    extension: "docx",
};

pub const PPTX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    extension: "pptx",
};

pub const PNG: ExportFormat = ExportFormat {
    mime_type: "image/png",
    extension: "png",
};

/// Why a file gets no local copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Jam,
    Shortcut,
    Unsupported(String),
    /// The name has no part that can stay below its folder.
    UnsafeName(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Jam => write!(f, "Jamboard files cannot be exported"),
            SkipReason::Shortcut => write!(f, "shortcuts have no content"),
            SkipReason::Unsupported(mime) => write!(f, "Unknown mime type: {}", mime),
            SkipReason::UnsafeName(name) => write!(f, "Unsafe file name: {}", name),
        }
    }
}

/// What to do with a remote file of a given MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePlan {
    Download,
    Export(ExportFormat),
    Skip(SkipReason),
}

/// Whether a MIME type is editor-native.
pub fn is_editor_document(mime_type: &str) -> bool {
    mime_type.starts_with(GOOGLE_APPS_PREFIX)
}

/// Choose the plan for a MIME type. Missing types are downloaded as bytes.
pub fn plan_for(mime_type: Option<&str>) -> FilePlan {
    let mime_type = match mime_type {
        Some(mime) if is_editor_document(mime) => mime,
        _ => return FilePlan::Download,
    };

    match mime_type {
        JAM => FilePlan::Skip(SkipReason::Jam),
        SHORTCUT => FilePlan::Skip(SkipReason::Shortcut),
        SPREADSHEET => FilePlan::Export(XLSX),
        DOCUMENT => FilePlan::Export(DOCX),
        PRESENTATION => FilePlan::Export(PPTX),
        DRAWING => FilePlan::Export(PNG),
        other => FilePlan::Skip(SkipReason::Unsupported(other.to_string())),
    }
}
