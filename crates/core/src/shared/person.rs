/// Stable identifier of an enrolled person.
pub type PersonId = i64;

/// Label shown for a person with no enrolled name.
pub fn fallback_name(person_id: PersonId) -> String {
    format!("ID: {person_id}")
}
