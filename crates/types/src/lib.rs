/// Errors that can occur when parsing a patient directory name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryNameError {
    /// The name did not contain exactly one `~` separator
    #[error("directory name `{0}` must contain exactly one `~` separator")]
    Separator(String),
    /// One side of the separator was empty
    #[error("directory name `{0}` must have a sequence and a patient ID either side of `~`")]
    EmptyComponent(String),
}

/// Width the sequence number is zero-padded to when building a sort key.
pub const SEQUENCE_KEY_WIDTH: usize = 6;

/// The name of a Monaco patient directory, `{sequence}~{patient_id}`.
///
/// Monaco prefixes every patient directory with a sequence number so that the same patient ID
/// can appear more than once within a clinic (e.g. `003~P1` and `012~P1`). Once constructed,
/// both halves are guaranteed to be present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientDirectoryName {
    raw: String,
    separator: usize,
}

impl PatientDirectoryName {
    /// Parses a directory name of the form `{sequence}~{patient_id}`.
    ///
    /// # Arguments
    ///
    /// * `input` - The bare directory name (not a path)
    ///
    /// # Returns
    ///
    /// Returns `Ok(PatientDirectoryName)` if the name holds exactly one `~` with text on
    /// either side, or a `DirectoryNameError` describing what is wrong.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, DirectoryNameError> {
        let raw = input.as_ref();
        let mut separators = raw.match_indices('~').map(|(index, _)| index);

        let separator = match (separators.next(), separators.next()) {
            (Some(index), None) => index,
            _ => return Err(DirectoryNameError::Separator(raw.to_owned())),
        };

        if separator == 0 || separator == raw.len() - 1 {
            return Err(DirectoryNameError::EmptyComponent(raw.to_owned()));
        }

        Ok(Self {
            raw: raw.to_owned(),
            separator,
        })
    }

    /// The sequence number prefix, as written on disk.
    pub fn sequence(&self) -> &str {
        &self.raw[..self.separator]
    }

    /// The patient ID suffix.
    pub fn patient_id(&self) -> &str {
        &self.raw[self.separator + 1..]
    }

    /// Returns the full directory name.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Builds the key used to list directories grouped by patient.
    ///
    /// The key is `{patient_id}.{sequence}` with the sequence left-padded with zeros to
    /// [`SEQUENCE_KEY_WIDTH`] characters, so directories for the same patient sort in
    /// ascending sequence order. Longer sequences are kept as they are.
    pub fn sort_key(&self) -> String {
        format!(
            "{}.{:0>width$}",
            self.patient_id(),
            self.sequence(),
            width = SEQUENCE_KEY_WIDTH
        )
    }
}

/// Builds the sort key for a raw directory name.
///
/// Convenience wrapper around [`PatientDirectoryName::parse`] followed by
/// [`PatientDirectoryName::sort_key`].
pub fn sort_key(name: &str) -> Result<String, DirectoryNameError> {
    PatientDirectoryName::parse(name).map(|name| name.sort_key())
}

impl std::fmt::Display for PatientDirectoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl AsRef<str> for PatientDirectoryName {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl std::str::FromStr for PatientDirectoryName {
    type Err = DirectoryNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for PatientDirectoryName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for PatientDirectoryName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientDirectoryName::parse(&s).map_err(serde::de::Error::custom)
    }
}
