//! Contact directories the screening engine looks numbers up in.

use crate::error::DirectoryError;
use crate::normalization::{normalize_str, NormalizedNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A known contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Number as the user stored it, unnormalized.
    pub number: String,
}

impl Contact {
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
        }
    }

    pub fn normalized_number(&self) -> NormalizedNumber {
        normalize_str(&self.number)
    }

    /// "Name <number>" when a name is present, otherwise just the number.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.number.clone()
        } else {
            format!("{} <{}>", self.name, self.number)
        }
    }
}

/// Read-only lookup of known contact numbers.
///
/// Implementations must be safe for concurrent reads. A lookup may block
/// (disk or cross-process access), so latency-sensitive callers should go
/// through [`ScreeningSession`](crate::session::ScreeningSession).
pub trait ContactDirectory: Send + Sync {
    /// Whether a stored contact normalizes to `number`.
    fn contains(&self, number: &NormalizedNumber) -> Result<bool, DirectoryError>;

    fn name(&self) -> &str;
}

impl<D: ContactDirectory + ?Sized> ContactDirectory for Arc<D> {
    fn contains(&self, number: &NormalizedNumber) -> Result<bool, DirectoryError> {
        (**self).contains(number)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<D: ContactDirectory + ?Sized> ContactDirectory for &D {
    fn contains(&self, number: &NormalizedNumber) -> Result<bool, DirectoryError> {
        (**self).contains(number)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Contacts held in memory, indexed by normalized number.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    contacts: Vec<Contact>,
    numbers: HashSet<NormalizedNumber>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contacts<I>(contacts: I) -> Self
    where
        I: IntoIterator<Item = Contact>,
    {
        let mut directory = Self::new();
        for contact in contacts {
            directory.insert(contact);
        }
        directory
    }

    /// Build a directory from bare numbers with no names attached.
    pub fn from_numbers<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_contacts(numbers.into_iter().map(|n| Contact::new("", n)))
    }

    /// Add a contact. Returns false when its number normalizes to nothing
    /// and was therefore not indexed.
    pub fn insert(&mut self, contact: Contact) -> bool {
        let normalized = contact.normalized_number();
        if normalized.is_empty() {
            log::warn!(
                "Skipping contact with no dialable digits: {}",
                contact.display()
            );
            return false;
        }

        self.numbers.insert(normalized);
        self.contacts.push(contact);
        true
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Number of distinct normalized numbers.
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

impl ContactDirectory for InMemoryDirectory {
    fn contains(&self, number: &NormalizedNumber) -> Result<bool, DirectoryError> {
        if number.is_empty() {
            return Ok(false);
        }
        Ok(self.numbers.contains(number))
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[derive(Debug, Deserialize)]
struct ContactsFile {
    #[serde(default)]
    contacts: Vec<Contact>,
}

/// Parse a TOML contacts file made of `[[contacts]]` tables.
pub fn load_contacts<P: AsRef<Path>>(path: P) -> Result<Vec<Contact>, DirectoryError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file: ContactsFile = toml::from_str(&content).map_err(|e| {
        DirectoryError::Unavailable(format!("invalid contacts file {}: {}", path.display(), e))
    })?;
    Ok(file.contacts)
}

/// Contacts stored in a TOML file, re-read on every lookup.
///
/// A missing or unparseable file is reported as a directory failure rather
/// than an empty directory.
#[derive(Debug, Clone)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current file contents into memory.
    pub fn snapshot(&self) -> Result<InMemoryDirectory, DirectoryError> {
        Ok(InMemoryDirectory::from_contacts(load_contacts(&self.path)?))
    }
}

impl ContactDirectory for FileDirectory {
    fn contains(&self, number: &NormalizedNumber) -> Result<bool, DirectoryError> {
        if number.is_empty() {
            return Ok(false);
        }
        let contacts = load_contacts(&self.path)?;
        Ok(contacts
            .iter()
            .any(|contact| &contact.normalized_number() == number))
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_stored_numbers_are_normalized_on_insert() {
        let directory = InMemoryDirectory::from_numbers(["+1 (555) 123-4567", "555.0000"]);

        assert_eq!(directory.len(), 2);
        assert!(directory.contains(&normalize_str("+15551234567")).unwrap());
        assert!(directory.contains(&normalize_str("5550000")).unwrap());
        assert!(!directory.contains(&normalize_str("15551234567")).unwrap());
    }

    #[test]
    fn test_contacts_without_digits_are_skipped() {
        let mut directory = InMemoryDirectory::new();
        assert!(!directory.insert(Contact::new("Voicemail", "voicemail")));
        assert!(directory.is_empty());
        assert!(!directory.contains(&normalize_str("")).unwrap());
    }

    #[test]
    fn test_duplicate_numbers_share_one_entry() {
        let directory = InMemoryDirectory::from_contacts([
            Contact::new("Alice", "+1 555 123 4567"),
            Contact::new("Alice (work)", "+1-555-123-4567"),
        ]);

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.contacts().len(), 2);
    }

    #[test]
    fn test_contact_display() {
        assert_eq!(
            Contact::new("Alice", "+15551234567").display(),
            "Alice <+15551234567>"
        );
        assert_eq!(Contact::new("", "5550000").display(), "5550000");
    }

    #[test]
    fn test_file_directory_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[contacts]]
name = "Alice"
number = "+1 (555) 123-4567"

[[contacts]]
number = "555-0000"
"#
        )
        .unwrap();

        let directory = FileDirectory::new(file.path());
        assert!(directory.contains(&normalize_str("+15551234567")).unwrap());
        assert!(directory.contains(&normalize_str("5550000")).unwrap());
        assert!(!directory.contains(&normalize_str("5551111")).unwrap());
        assert_eq!(directory.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_a_failure() {
        let directory = FileDirectory::new("/nonexistent/call-screener/contacts.toml");
        let result = directory.contains(&normalize_str("5550000"));
        assert!(matches!(result, Err(DirectoryError::Io(_))));
    }

    #[test]
    fn test_invalid_file_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "contacts = 42").unwrap();

        let directory = FileDirectory::new(file.path());
        let result = directory.contains(&normalize_str("5550000"));
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }

    #[test]
    fn test_shared_directory_delegates() {
        let directory = Arc::new(InMemoryDirectory::from_numbers(["5550000"]));
        let shared: Arc<dyn ContactDirectory> = directory;
        assert!(shared.contains(&normalize_str("555 0000")).unwrap());
        assert_eq!(shared.name(), "in_memory");
    }
}
