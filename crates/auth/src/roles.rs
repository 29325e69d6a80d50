use serde::{Deserialize, Serialize};

/// Role held by a principal.
///
/// The backend returns free-text role descriptions ("SuperAdmin",
/// "Condomínio", "morador", ...). They are translated exactly once, by
/// [`Role::from_label`], and compared as enum values from then on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operates across tenants by explicit selection.
    SuperAdmin,
    /// Manages a single condominium.
    Condominium,
    /// Resident of a condominium.
    Resident,
    /// Any label the console does not know.
    Unrecognized,
}

impl Role {
    /// Translate a backend role label.
    ///
    /// Matching ignores surrounding whitespace, letter case and Portuguese
    /// diacritics, so "Condomínio", "CONDOMINIO" and " condominio " agree.
    /// Accents may arrive precomposed or as combining marks.
    pub fn from_label(label: &str) -> Self {
        match fold_label(label).as_str() {
            "superadmin" => Role::SuperAdmin,
            "condominio" => Role::Condominium,
            "morador" => Role::Resident,
            _ => Role::Unrecognized,
        }
    }

    /// The one role allowed to operate across tenants.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Roles whose header shows an unread-notification badge.
    pub fn receives_notifications(&self) -> bool {
        matches!(self, Role::Condominium | Role::Resident)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Condominium => "condominio",
            Role::Resident => "morador",
            Role::Unrecognized => "unrecognized",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fold_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Combining diacritical marks (U+0300..=U+036F), as left by NFD text.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_backend_labels() {
        for label in ["superadmin", "SuperAdmin", "SUPERADMIN", " superadmin "] {
            assert_eq!(Role::from_label(label), Role::SuperAdmin, "{label}");
        }
        for label in [
            "condominio",
            "Condominio",
            "condomínio",
            "Condomínio",
            "CONDOMÍNIO",
            "Condomi\u{301}nio",
            "CONDOMI\u{301}NIO",
        ] {
            assert_eq!(Role::from_label(label), Role::Condominium, "{label}");
        }
        for label in ["morador", "Morador", "MORADOR"] {
            assert_eq!(Role::from_label(label), Role::Resident, "{label}");
        }
    }

    #[test]
    fn stray_combining_marks_are_ignored() {
        assert_eq!(Role::from_label("mo\u{301}rador"), Role::Resident);
        assert_eq!(Role::from_label("superadmi\u{303}n"), Role::SuperAdmin);
    }

    #[test]
    fn unknown_labels_are_unrecognized() {
        assert_eq!(Role::from_label(""), Role::Unrecognized);
        assert_eq!(Role::from_label("super admin"), Role::Unrecognized);
        assert_eq!(Role::from_label("admin"), Role::Unrecognized);
    }

    #[test]
    fn only_superadmin_is_privileged() {
        assert!(Role::SuperAdmin.is_privileged());
        assert!(!Role::Condominium.is_privileged());
        assert!(!Role::Resident.is_privileged());
        assert!(!Role::Unrecognized.is_privileged());
    }

    #[test]
    fn as_str_translates_back() {
        for role in [Role::SuperAdmin, Role::Condominium, Role::Resident] {
            assert_eq!(Role::from_label(role.as_str()), role);
        }
    }

    fn mixed_case(word: &'static str) -> impl Strategy<Value = String> {
        proptest::collection::vec(any::<bool>(), word.chars().count()).prop_map(move |upper| {
            word.chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_uppercase().next().unwrap_or(c) } else { c })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn superadmin_matches_in_any_case(label in mixed_case("superadmin")) {
            prop_assert_eq!(Role::from_label(&label), Role::SuperAdmin);
        }

        #[test]
        fn condominio_matches_with_or_without_accent(
            label in prop_oneof![
                mixed_case("condominio"),
                mixed_case("condomínio"),
                mixed_case("condomi\u{301}nio"),
            ]
        ) {
            prop_assert_eq!(Role::from_label(&label), Role::Condominium);
        }
    }
}
