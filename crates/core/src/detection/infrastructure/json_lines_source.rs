use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::domain::detection_source::{DetectionSource, FrameFaces};
use crate::detection::domain::raw_face::RawFace;

/// Replays recorded detector output, one JSON array of faces per line.
///
/// Blank lines are skipped. A line that does not parse yields an error for
/// that frame only; later lines are still read. The source is recorded
/// unless marked live, e.g. when reading a pipe fed by a running detector.
pub struct JsonLinesDetectionSource<R> {
    reader: Option<R>,
    live: bool,
}

impl JsonLinesDetectionSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open detections {}: {e}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> JsonLinesDetectionSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            live: false,
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
}

impl<R: BufRead + Send> DetectionSource for JsonLinesDetectionSource<R> {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameFaces> + '_> {
        let Some(reader) = self.reader.as_mut() else {
            return Box::new(std::iter::empty());
        };
        Box::new(
            reader
                .lines()
                .enumerate()
                .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
                .map(|(index, line)| -> FrameFaces {
                    let line = line?;
                    serde_json::from_str::<Vec<RawFace>>(&line)
                        .map_err(|e| format!("line {}: {e}", index + 1).into())
                }),
        )
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
