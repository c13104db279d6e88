//! Contact list and message template files.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub address: String,
}

/// Recipients, one `<name> <address>` pair per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactBook {
    contacts: Vec<Contact>,
}

impl ContactBook {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read contacts file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse contacts file {}", path.display()))
    }

    /// Blank lines and `#` comments are skipped; fields past the second are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut contacts = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(name), Some(address)) => contacts.push(Contact {
                    name: name.to_string(),
                    address: address.to_string(),
                }),
                _ => {
                    return Err(anyhow!(
                        "line {}: expected '<name> <address>', got '{}'",
                        index + 1,
                        line
                    ))
                }
            }
        }
        Ok(Self { contacts })
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Message body with `$NAME` / `${NAME}` placeholders. `$$` is a literal `$`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
}

fn placeholder_re() -> &'static regex::Regex {
    static PLACEHOLDER_RE: OnceLock<regex::Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        regex::Regex::new(
            r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))",
        )
        .unwrap()
    })
}

impl MessageTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read message template {}", path.display()))?;
        Ok(Self::new(source))
    }

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute every placeholder. A placeholder without a value, or a `$`
    /// not followed by a name, brace or `$`, is an error.
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;
        for caps in placeholder_re().captures_iter(&self.source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&self.source[last..whole.start()]);
            last = whole.end();

            if caps.name("escaped").is_some() {
                out.push('$');
                continue;
            }
            let name = match caps.name("named").or_else(|| caps.name("braced")) {
                Some(name) => name.as_str(),
                None => {
                    let (line, column) = line_column(&self.source, whole.start());
                    return Err(anyhow!(
                        "invalid placeholder at line {}, column {}",
                        line,
                        column
                    ));
                }
            };
            let value = values
                .get(name)
                .ok_or_else(|| anyhow!("message template uses unknown placeholder ${}", name))?;
            out.push_str(value);
        }
        out.push_str(&self.source[last..]);
        Ok(out)
    }
}

/// Capitalize the first letter of every word, lowercase the rest.
///
/// Any non-letter starts a new word, so `mary-jane` becomes `Mary-Jane`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> HashMap<&'static str, String> {
        HashMap::from([
            ("PERSON_NAME", "Alice".to_string()),
            ("SECONDS", "60".to_string()),
        ])
    }

    #[test]
    fn parses_contacts_skipping_comments() -> Result<()> {
        let book = ContactBook::parse(
            "# household\nalice alice@example.com\n\n  bob   bob@example.com  extra\n",
        )?;
        assert_eq!(book.len(), 2);
        assert_eq!(book.contacts()[0].name, "alice");
        assert_eq!(book.contacts()[1].address, "bob@example.com");
        Ok(())
    }

    #[test]
    fn short_contact_line_names_the_line() {
        let err = ContactBook::parse("alice alice@example.com\nbob\n")
            .err()
            .expect("missing address");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn loads_contacts_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("contacts.txt");
        std::fs::write(&path, "carol carol@example.com\n")?;
        assert_eq!(ContactBook::load(&path)?.len(), 1);
        assert!(ContactBook::load(&dir.path().join("missing.txt")).is_err());
        Ok(())
    }

    #[test]
    fn renders_both_placeholder_forms() -> Result<()> {
        let template = MessageTemplate::new(
            "<p>Dear ${PERSON_NAME},</p><p>Next alert in $SECONDS s. Cost: $$0</p>",
        );
        assert_eq!(
            template.render(&values())?,
            "<p>Dear Alice,</p><p>Next alert in 60 s. Cost: $0</p>"
        );
        Ok(())
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let template = MessageTemplate::new("Hi $NICKNAME");
        let err = template.render(&values()).err().expect("unknown placeholder");
        assert!(err.to_string().contains("NICKNAME"));
    }

    #[test]
    fn dangling_dollar_is_an_error() {
        let template = MessageTemplate::new("line one\ncosts $ 5");
        let err = template.render(&values()).err().expect("invalid placeholder");
        assert!(err.to_string().contains("line 2, column 7"));
    }

    #[test]
    fn title_case_matches_name_conventions() {
        assert_eq!(title_case("alice"), "Alice");
        assert_eq!(title_case("mary-jane"), "Mary-Jane");
        assert_eq!(title_case("MCDONALD"), "Mcdonald");
        assert_eq!(title_case("o'neil"), "O'Neil");
    }
}
