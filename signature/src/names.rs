//! Validators for the name grammars carried in message header fields.

/// Maximum length of interface, member, error, and bus names.
pub const NAME_MAX_LENGTH: usize = 255;

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Returns `true` if `s` is a valid object path.
///
/// A path is `/` alone, or `/`-separated nonempty elements of
/// `[A-Za-z0-9_]`, with no trailing slash.
#[must_use]
pub fn object_path_is_valid(s: &str) -> bool {
    let b = s.as_bytes();
    if b.first() != Some(&b'/') {
        return false;
    }
    if b.len() == 1 {
        return true;
    }

    let mut previous_slash = true;
    for &c in &b[1..] {
        if c == b'/' {
            if previous_slash {
                return false;
            }
            previous_slash = true;
        } else {
            if !is_name_char(c) {
                return false;
            }
            previous_slash = false;
        }
    }

    !previous_slash
}

fn dotted_name_is_valid(s: &str, minimum_elements: usize) -> bool {
    let b = s.as_bytes();
    if b.is_empty() || b.len() > NAME_MAX_LENGTH {
        return false;
    }

    let mut elements = 0usize;
    for element in b.split(|&c| c == b'.') {
        let Some(&first) = element.first() else {
            return false;
        };
        if !is_name_start(first) {
            return false;
        }
        if !element[1..].iter().all(|&c| is_name_char(c)) {
            return false;
        }
        elements += 1;
    }

    elements >= minimum_elements
}

/// Returns `true` if `s` is a valid interface name: at least two
/// dot-separated elements, each `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn interface_name_is_valid(s: &str) -> bool {
    dotted_name_is_valid(s, 2)
}

/// Returns `true` if `s` is a valid member name: a single element with no
/// dots.
#[must_use]
pub fn member_name_is_valid(s: &str) -> bool {
    let b = s.as_bytes();
    if b.is_empty() || b.len() > NAME_MAX_LENGTH {
        return false;
    }
    is_name_start(b[0]) && b[1..].iter().all(|&c| is_name_char(c))
}

/// Returns `true` if `s` is a valid error name (interface-name shaped).
#[must_use]
pub fn error_name_is_valid(s: &str) -> bool {
    interface_name_is_valid(s)
}

/// Returns `true` if `s` is a valid bus name.
///
/// Unique names start with `:` and their elements may begin with digits;
/// well-known names may not. Both use `[A-Za-z0-9_-]` elements separated
/// by at least one dot.
#[must_use]
pub fn service_name_is_valid(s: &str) -> bool {
    let b = s.as_bytes();
    if b.is_empty() || b.len() > NAME_MAX_LENGTH {
        return false;
    }

    let unique = b[0] == b':';
    let rest = if unique { &b[1..] } else { b };
    if rest.is_empty() {
        return false;
    }

    let mut elements = 0usize;
    for element in rest.split(|&c| c == b'.') {
        let Some(&first) = element.first() else {
            return false;
        };
        let start_ok = is_name_start(first) || first == b'-' || (unique && first.is_ascii_digit());
        if !start_ok {
            return false;
        }
        if !element[1..]
            .iter()
            .all(|&c| is_name_char(c) || c == b'-')
        {
            return false;
        }
        elements += 1;
    }

    elements >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths() {
        assert!(object_path_is_valid("/"));
        assert!(object_path_is_valid("/foo"));
        assert!(object_path_is_valid("/foo/bar_baz/Q2"));
        assert!(!object_path_is_valid(""));
        assert!(!object_path_is_valid("foo"));
        assert!(!object_path_is_valid("/foo/"));
        assert!(!object_path_is_valid("//foo"));
        assert!(!object_path_is_valid("/foo//bar"));
        assert!(!object_path_is_valid("/foo-bar"));
        assert!(!object_path_is_valid("/foo.bar"));
    }

    #[test]
    fn interface_names() {
        assert!(interface_name_is_valid("com.example"));
        assert!(interface_name_is_valid("org.freedesktop.DBus"));
        assert!(interface_name_is_valid("a._b.C9"));
        assert!(!interface_name_is_valid("single"));
        assert!(!interface_name_is_valid(""));
        assert!(!interface_name_is_valid("com..example"));
        assert!(!interface_name_is_valid(".com.example"));
        assert!(!interface_name_is_valid("com.example."));
        assert!(!interface_name_is_valid("com.9example"));
        assert!(!interface_name_is_valid("com.exa-mple"));
    }

    #[test]
    fn member_names() {
        assert!(member_name_is_valid("Hello"));
        assert!(member_name_is_valid("_private9"));
        assert!(!member_name_is_valid(""));
        assert!(!member_name_is_valid("9tail"));
        assert!(!member_name_is_valid("Get.Set"));
        assert!(!member_name_is_valid("Spa ce"));
    }

    #[test]
    fn error_names_follow_interface_rules() {
        assert!(error_name_is_valid("com.example.BadArg"));
        assert!(!error_name_is_valid("BadArg"));
    }

    #[test]
    fn well_known_bus_names() {
        assert!(service_name_is_valid("org.freedesktop.DBus"));
        assert!(service_name_is_valid("com.example-corp.App"));
        assert!(!service_name_is_valid("nodots"));
        assert!(!service_name_is_valid("org..example"));
        assert!(!service_name_is_valid("org.2example"));
        assert!(!service_name_is_valid(""));
    }

    #[test]
    fn unique_bus_names() {
        assert!(service_name_is_valid(":1.42"));
        assert!(service_name_is_valid(":1.foo.2"));
        assert!(!service_name_is_valid(":"));
        assert!(!service_name_is_valid(":1"));
        assert!(!service_name_is_valid(":1..2"));
    }

    #[test]
    fn name_length_cap() {
        let long = format!("a.{}", "b".repeat(NAME_MAX_LENGTH));
        assert!(!interface_name_is_valid(&long));
        assert!(!member_name_is_valid(&"m".repeat(NAME_MAX_LENGTH + 1)));
    }
}
