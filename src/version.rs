use std::cmp::Ordering;
use std::fmt;

/// A (family, major, minor) triple parsed from a model identifier.
///
/// Two versions are only comparable when their families match, where
/// "match" means one family name contains the other, ignoring case. This is
/// what lets `gpt-5-mini` be compared against a plain `gpt` 5.0 threshold.
#[derive(Debug, Clone)]
pub struct AIModelVersion {
    family: String,
    major: u32,
    minor: u32,
}

impl AIModelVersion {
    pub fn new(family: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            family: family.into().to_lowercase(),
            major,
            minor,
        }
    }

    /// Parse a raw model identifier.
    ///
    /// ```rust
    /// use ai_facade::AIModelVersion;
    ///
    /// let version = AIModelVersion::parse("claude-sonnet-4-5-20250929");
    /// assert_eq!(version.family(), "claude");
    /// assert_eq!((version.major(), version.minor()), (4, 5));
    /// assert!(AIModelVersion::new("gpt", 5, 0) <= AIModelVersion::parse("gpt-5-mini"));
    /// ```
    pub fn parse(model: &str) -> Self {
        let lower = model.trim().to_lowercase();
        // Vendor prefixes such as "models/" or "meta-llama/"
        let name = lower.rsplit('/').next().unwrap_or(&lower);

        let family: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let rest = &name[family.len()..];

        let mut tokens = rest
            .split(|c: char| c == '-' || c == '.' || c == '_' || c == ':')
            .filter(|token| !token.is_empty())
            .peekable();

        let mut major = None;
        while let Some(token) = tokens.next() {
            let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                continue;
            }
            major = digits.parse::<u32>().ok();
            // Only a bare number right after the major counts as minor ("4o" has none)
            if digits.len() == token.len() {
                if let Some(next) = tokens.peek() {
                    if next.len() <= 2 && next.chars().all(|c| c.is_ascii_digit()) {
                        let minor = next.parse::<u32>().unwrap_or(0);
                        return Self::new(family, major.unwrap_or(0), minor);
                    }
                }
            }
            break;
        }

        Self::new(family, major.unwrap_or(0), 0)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Whether both versions belong to the same model family
    pub fn same_family(&self, other: &AIModelVersion) -> bool {
        !self.family.is_empty()
            && !other.family.is_empty()
            && (self.family.contains(&other.family) || other.family.contains(&self.family))
    }
}

impl PartialEq for AIModelVersion {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for AIModelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.same_family(other) {
            return None;
        }
        Some((self.major, self.minor).cmp(&(other.major, other.minor)))
    }
}

impl fmt::Display for AIModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.family, self.major, self.minor)
    }
}
