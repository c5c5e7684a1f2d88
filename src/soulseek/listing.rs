use crate::soulseek::types::FileListing;

/// Extensions treated as audio when building candidates.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "m4a", "ogg", "aac", "aiff", "opus", "wma", "alac", "ape",
];

pub fn is_audio_extension(extension: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&extension)
}

/// A peer listing with the lowercase path parts the scorers compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedListing {
    pub file_name: String,
    pub folder_name: String,
    pub extension: String,
    pub listing: FileListing,
}

impl NormalizedListing {
    pub fn is_audio(&self) -> bool {
        is_audio_extension(&self.extension)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        if self.extension.is_empty() {
            return &self.file_name;
        }
        &self.file_name[..self.file_name.len() - self.extension.len() - 1]
    }

    /// Basename in its original casing, as the peer advertised it.
    pub fn original_file_name(&self) -> &str {
        split_path(&self.listing.remote_path).0
    }
}

/// Returns `(basename, parent)` of a peer path. Both `\` and `/` separate.
fn split_path(path: &str) -> (&str, &str) {
    let mut parts = path
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .filter(|s| !s.is_empty());
    let file_name = parts.next().unwrap_or("");
    let folder_name = parts.next().unwrap_or("");
    (file_name, folder_name)
}

fn extension_of(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 && dot_pos + 1 < file_name.len() => {
            file_name[dot_pos + 1..].to_string()
        }
        _ => String::new(),
    }
}

pub fn normalize_listing(listing: &FileListing) -> NormalizedListing {
    let (file_name, folder_name) = split_path(&listing.remote_path);
    let file_name = file_name.to_lowercase();
    let extension = extension_of(&file_name);

    NormalizedListing {
        folder_name: folder_name.to_lowercase(),
        extension,
        file_name,
        listing: listing.clone(),
    }
}
