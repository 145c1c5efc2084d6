use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::recognition::domain::face_matcher::FaceMatch;
use crate::shared::constants::ENCODING_DIMENSIONS;
use crate::shared::face_encoding::FaceEncoding;
use crate::shared::person::PersonId;

/// Immutable snapshot of the known faces.
///
/// Ids are kept in ascending order and the encodings are packed row-wise
/// into one matrix, so a query is a single broadcast subtraction. Any
/// mutation builds a new snapshot with a bumped `version`.
#[derive(Clone, Debug)]
pub struct Gallery {
    entries: BTreeMap<PersonId, FaceEncoding>,
    ids: Vec<PersonId>,
    matrix: Array2<f64>,
    version: u64,
}

impl Gallery {
    pub fn empty() -> Self {
        Self::build(BTreeMap::new(), 0)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (PersonId, FaceEncoding)>) -> Self {
        Self::build(entries.into_iter().collect(), 0)
    }

    fn build(entries: BTreeMap<PersonId, FaceEncoding>, version: u64) -> Self {
        let mut matrix = Array2::<f64>::zeros((entries.len(), ENCODING_DIMENSIONS));
        for (mut row, encoding) in matrix.rows_mut().into_iter().zip(entries.values()) {
            row.assign(&ArrayView1::from(encoding.as_slice()));
        }
        let ids = entries.keys().copied().collect();
        Self {
            entries,
            ids,
            matrix,
            version,
        }
    }

    /// New snapshot with `person_id` added, or its encoding replaced.
    pub fn with_person(&self, person_id: PersonId, encoding: FaceEncoding) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(person_id, encoding);
        Self::build(entries, self.version + 1)
    }

    /// New snapshot without `person_id`. Unknown ids still bump the version.
    pub fn without_person(&self, person_id: PersonId) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(&person_id);
        Self::build(entries, self.version + 1)
    }

    /// Same entries as `other`, numbered after `self`.
    pub fn succeeded_by(&self, other: Gallery) -> Self {
        Self::build(other.entries, self.version + 1)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, person_id: PersonId) -> bool {
        self.entries.contains_key(&person_id)
    }

    pub fn get(&self, person_id: PersonId) -> Option<&FaceEncoding> {
        self.entries.get(&person_id)
    }

    pub fn ids(&self) -> &[PersonId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &FaceEncoding)> {
        self.entries.iter().map(|(id, enc)| (*id, enc))
    }

    /// Euclidean distance from `query` to every entry, in id order.
    pub fn distances(&self, query: &FaceEncoding) -> Array1<f64> {
        let query = ArrayView1::from(query.as_slice());
        let diff = &self.matrix - &query;
        diff.mapv(|d| d * d).sum_axis(Axis(1)).mapv(f64::sqrt)
    }

    /// Closest entry as `(person_id, distance)`. Ties go to the lowest id.
    pub fn nearest(&self, query: &FaceEncoding) -> Option<(PersonId, f64)> {
        let distances = self.distances(query);
        let mut best: Option<(PersonId, f64)> = None;
        for (id, &distance) in self.ids.iter().zip(distances.iter()) {
            if distance.is_nan() {
                continue;
            }
            // Strict comparison over ascending ids keeps the lowest id on ties.
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((*id, distance));
            }
        }
        best
    }

    /// Nearest entry accepted only within `tolerance`.
    pub fn best_match(&self, query: &FaceEncoding, tolerance: f64) -> FaceMatch {
        match self.nearest(query) {
            Some((person_id, distance)) if distance <= tolerance => {
                FaceMatch::known(person_id, confidence_from_distance(distance))
            }
            _ => FaceMatch::unknown(),
        }
    }
}

impl Default for Gallery {
    fn default() -> Self {
        Self::empty()
    }
}

/// `1 - distance`, floored at zero and rounded to three decimals.
pub fn confidence_from_distance(distance: f64) -> f64 {
    ((1.0 - distance).max(0.0) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn axis(index: usize, value: f64) -> FaceEncoding {
        let mut v = vec![0.0; ENCODING_DIMENSIONS];
        v[index] = value;
        FaceEncoding::new(v).unwrap()
    }

    fn origin() -> FaceEncoding {
        FaceEncoding::new(vec![0.0; ENCODING_DIMENSIONS]).unwrap()
    }

    #[test]
    fn test_empty_gallery_has_no_nearest() {
        let g = Gallery::empty();
        assert!(g.is_empty());
        assert!(g.nearest(&origin()).is_none());
        assert_eq!(g.best_match(&origin(), 0.6), FaceMatch::unknown());
    }

    #[test]
    fn test_distances_follow_id_order() {
        let g = Gallery::from_entries([(9, axis(0, 2.0)), (3, axis(1, 1.0))]);
        assert_eq!(g.ids(), &[3, 9]);
        let d = g.distances(&origin());
        assert_relative_eq!(d[0], 1.0);
        assert_relative_eq!(d[1], 2.0);
    }

    #[test]
    fn test_matrix_distance_agrees_with_pairwise_distance() {
        let a: Vec<f64> = (0..ENCODING_DIMENSIONS).map(|i| (i as f64).sin()).collect();
        let b: Vec<f64> = (0..ENCODING_DIMENSIONS).map(|i| (i as f64).cos()).collect();
        let a = FaceEncoding::new(a).unwrap();
        let b = FaceEncoding::new(b).unwrap();
        let g = Gallery::from_entries([(1, a.clone())]);
        assert_relative_eq!(g.distances(&b)[0], a.distance(&b), epsilon = 1e-12);
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let g = Gallery::from_entries([(42, axis(0, 0.3)), (7, axis(1, 0.3)), (19, axis(2, 0.3))]);
        let (id, distance) = g.nearest(&origin()).unwrap();
        assert_eq!(id, 7);
        assert_relative_eq!(distance, 0.3);
    }

    #[test]
    fn test_best_match_scenario() {
        // Query sits 0.55 from person 1 and 0.9 from person 2.
        let g = Gallery::from_entries([(1, origin()), (2, axis(0, 1.45))]);
        let query = axis(0, 0.55);
        let m = g.best_match(&query, 0.6);
        assert_eq!(m.person_id, Some(1));
        assert_relative_eq!(m.confidence, 0.45);
    }

    #[test]
    fn test_beyond_tolerance_is_unknown() {
        let g = Gallery::from_entries([(1, axis(0, 0.7))]);
        assert_eq!(g.best_match(&origin(), 0.6), FaceMatch::unknown());
    }

    #[test]
    fn test_distance_equal_to_tolerance_is_accepted() {
        let g = Gallery::from_entries([(1, axis(0, 0.5))]);
        let m = g.best_match(&origin(), 0.5);
        assert_eq!(m.person_id, Some(1));
        assert_relative_eq!(m.confidence, 0.5);
    }

    #[test]
    fn test_with_and_without_person_bump_version() {
        let g = Gallery::empty();
        let g1 = g.with_person(5, origin());
        let g2 = g1.without_person(5);
        assert_eq!((g.version(), g1.version(), g2.version()), (0, 1, 2));
        assert!(g1.contains(5));
        assert!(!g2.contains(5));
        assert!(g.is_empty());
    }

    #[test]
    fn test_with_person_replaces_encoding() {
        let g = Gallery::from_entries([(1, axis(0, 1.0))]).with_person(1, axis(0, 2.0));
        assert_eq!(g.len(), 1);
        assert_eq!(g.get(1), Some(&axis(0, 2.0)));
    }

    #[rstest]
    #[case::exact(0.0, 1.0)]
    #[case::rounds_down(0.1236, 0.876)]
    #[case::rounds_up(0.1234, 0.877)]
    #[case::far(1.7, 0.0)]
    fn test_confidence_from_distance(#[case] distance: f64, #[case] expected: f64) {
        assert_relative_eq!(confidence_from_distance(distance), expected);
    }
}
