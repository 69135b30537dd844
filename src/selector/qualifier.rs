use crate::bytecode::MethodDescriptor;
use std::fmt;

/// A parsed target selector such as `Lcom/example/Foo;bar(I)V`.
///
/// Every part is optional; callers decide which parts they need.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodQualifier {
    pub owner: Option<String>,
    pub name: Option<String>,
    pub desc: Option<String>,
}

impl MethodQualifier {
    /// Parse a selector. Returns `None` when the input does not follow the
    /// `[Lowner;][name][(params)return]` grammar.
    pub fn parse(input: &str) -> Option<Self> {
        let mut rest = input;

        let mut owner = None;
        if rest.starts_with('L') {
            let paren = rest.find('(').unwrap_or(rest.len());
            if let Some(semi) = rest[..paren].find(';') {
                let name = &rest[1..semi];
                if name.is_empty() || !name.chars().all(is_owner_char) {
                    return None;
                }
                owner = Some(name.to_string());
                rest = &rest[semi + 1..];
            }
        }

        let name_end = rest.find('(').unwrap_or(rest.len());
        let name = &rest[..name_end];
        if !name.chars().all(is_name_char) {
            return None;
        }
        let name = (!name.is_empty()).then(|| name.to_string());

        let desc = &rest[name_end..];
        let desc = if desc.is_empty() {
            None
        } else {
            MethodDescriptor::parse(desc).ok()?;
            Some(desc.to_string())
        };

        Some(Self { owner, name, desc })
    }

    pub fn matches(&self, name: &str, desc: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n == name)
            && self.desc.as_deref().map_or(true, |d| d == desc)
    }
}

impl fmt::Display for MethodQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "L{owner};")?;
        }
        if let Some(name) = &self.name {
            f.write_str(name)?;
        }
        if let Some(desc) = &self.desc {
            f.write_str(desc)?;
        }
        Ok(())
    }
}

fn is_owner_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '$')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '<' | '>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_selector() {
        let q = MethodQualifier::parse("Lnet/example/Level;tick(Ljava/util/function/BooleanSupplier;)V")
            .unwrap();
        assert_eq!(q.owner.as_deref(), Some("net/example/Level"));
        assert_eq!(q.name.as_deref(), Some("tick"));
        assert_eq!(q.desc.as_deref(), Some("(Ljava/util/function/BooleanSupplier;)V"));
    }

    #[test]
    fn name_only_and_name_with_descriptor() {
        let q = MethodQualifier::parse("render").unwrap();
        assert_eq!(q.name.as_deref(), Some("render"));
        assert_eq!(q.desc, None);

        let q = MethodQualifier::parse("<init>(I)V").unwrap();
        assert_eq!(q.name.as_deref(), Some("<init>"));
        assert_eq!(q.desc.as_deref(), Some("(I)V"));
    }

    #[test]
    fn name_starting_with_l_is_not_an_owner() {
        let q = MethodQualifier::parse("load(I)V").unwrap();
        assert_eq!(q.owner, None);
        assert_eq!(q.name.as_deref(), Some("load"));
    }

    #[test]
    fn owner_without_name_has_no_name() {
        let q = MethodQualifier::parse("La/B;").unwrap();
        assert_eq!(q.owner.as_deref(), Some("a/B"));
        assert_eq!(q.name, None);
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        assert_eq!(MethodQualifier::parse("tick(I"), None);
        assert_eq!(MethodQualifier::parse("ti ck()V"), None);
        assert_eq!(MethodQualifier::parse("tick(Q)V"), None);
    }

    #[test]
    fn display_round_trips() {
        let input = "La/B;c(IJ)Ljava/lang/String;";
        assert_eq!(MethodQualifier::parse(input).unwrap().to_string(), input);
    }
}
