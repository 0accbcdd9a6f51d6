//! Name grammars from the D-Bus specification.

/// Longest interface or member name the bus accepts, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

fn is_name_element(element: &str) -> bool {
    let mut chars = element.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_path_element(element: &str) -> bool {
    !element.is_empty() && element.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `org.freedesktop.DBus`: at least two dot-separated elements, none of
/// which starts with a digit.
pub fn is_valid_interface_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && name.split('.').count() >= 2 && name.split('.').all(is_name_element)
}

/// Method, signal and property names.
pub fn is_valid_member_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && is_name_element(name)
}

/// `/` or `/a/b_c/D1`.
pub fn is_valid_absolute_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    match path.strip_prefix('/') {
        Some(rest) => rest.split('/').all(is_path_element),
        None => false,
    }
}

/// `a/b_c/D1`, as used for child nodes.
pub fn is_valid_relative_path(path: &str) -> bool {
    path.split('/').all(is_path_element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        assert!(is_valid_interface_name("org.freedesktop.DBus"));
        assert!(is_valid_interface_name("I._1"));
        assert!(!is_valid_interface_name("org"));
        assert!(!is_valid_interface_name("org..Foo"));
        assert!(!is_valid_interface_name("org.1Foo"));
        assert!(!is_valid_interface_name("org.Foo-Bar"));
        assert!(!is_valid_interface_name(""));
        let long = format!("a.{}", "b".repeat(MAX_NAME_LENGTH));
        assert!(!is_valid_interface_name(&long));
    }

    #[test]
    fn test_member_names() {
        assert!(is_valid_member_name("GetAll"));
        assert!(is_valid_member_name("_private"));
        assert!(!is_valid_member_name("9Lives"));
        assert!(!is_valid_member_name("Get.All"));
        assert!(!is_valid_member_name(""));
    }

    #[test]
    fn test_paths() {
        assert!(is_valid_absolute_path("/"));
        assert!(is_valid_absolute_path("/org/freedesktop/sample_object"));
        assert!(!is_valid_absolute_path("/org/"));
        assert!(!is_valid_absolute_path("org/foo"));
        assert!(!is_valid_absolute_path("//"));

        assert!(is_valid_relative_path("child_of_sample_object"));
        assert!(is_valid_relative_path("a/b/1"));
        assert!(!is_valid_relative_path("/a"));
        assert!(!is_valid_relative_path("a/"));
        assert!(!is_valid_relative_path(""));
    }
}
