//! Fill a form template: locate markers once, pair answers, draw them

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::PdfForm;
use crate::error::FormFillError;
use crate::locator::{MarkerLocator, MarkerOccurrence};
use crate::placement::{pair_answers, PlacedAnswer, PlacementRule};
use crate::render::{AnswerRenderer, TextStyle};

/// Counts describing a fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub markers_found: usize,
    pub answers_placed: usize,
    pub markers_unfilled: usize,
    pub answers_dropped: usize,
}

/// Locator, placement rule and renderer for filling forms
#[derive(Debug, Clone, Default)]
pub struct FormFiller {
    locator: MarkerLocator,
    rule: PlacementRule,
    renderer: AnswerRenderer,
}

impl FormFiller {
    pub fn new(locator: MarkerLocator) -> Self {
        Self {
            locator,
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, rule: PlacementRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.renderer = AnswerRenderer::new(style);
        self
    }

    /// Fill the template in `pdf_bytes` with `answers`
    pub fn fill<S: AsRef<str>>(&self, pdf_bytes: &[u8], answers: &[S]) -> Result<FilledForm, FormFillError> {
        let mut form = PdfForm::from_bytes(pdf_bytes)?;
        let markers = self.locator.locate(&form)?;
        for (i, marker) in markers.iter().enumerate() {
            debug!(
                index = i,
                page = marker.page,
                x0 = marker.rect.x0,
                y0 = marker.rect.y0,
                x1 = marker.rect.x1,
                y1 = marker.rect.y1,
                "Marker found"
            );
        }

        let widths = (0..form.page_count())
            .map(|i| form.page_box(i).map(|b| b.width()))
            .collect::<Result<Vec<_>, _>>()?;
        let pairing = pair_answers(&markers, answers, &self.rule, |page| widths[page]);

        if !pairing.unfilled.is_empty() {
            warn!(
                markers = markers.len(),
                answers = answers.len(),
                blank = pairing.unfilled.len(),
                "Fewer answers than markers; trailing markers left blank"
            );
        }
        if pairing.dropped > 0 {
            warn!(
                markers = markers.len(),
                answers = answers.len(),
                dropped = pairing.dropped,
                "More answers than markers; surplus answers dropped"
            );
        }

        let report = FillReport {
            markers_found: markers.len(),
            answers_placed: pairing.pairs.len(),
            markers_unfilled: pairing.unfilled.len(),
            answers_dropped: pairing.dropped,
        };

        let output = if pairing.pairs.is_empty() {
            FilledOutput::Unchanged(pdf_bytes.to_vec())
        } else {
            self.renderer.render(&mut form, &pairing.pairs)?;
            FilledOutput::Modified(form)
        };

        info!(
            markers_found = report.markers_found,
            answers_placed = report.answers_placed,
            "Filled form"
        );

        Ok(FilledForm {
            output,
            markers,
            placed: pairing.pairs,
            report,
        })
    }
}

enum FilledOutput {
    /// Nothing was drawn; the source bytes are passed through
    Unchanged(Vec<u8>),
    Modified(PdfForm),
}

/// A filled form ready to be written out
pub struct FilledForm {
    output: FilledOutput,
    markers: Vec<MarkerOccurrence>,
    placed: Vec<PlacedAnswer>,
    report: FillReport,
}

impl std::fmt::Debug for FilledForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilledForm")
            .field("report", &self.report)
            .field("modified", &matches!(self.output, FilledOutput::Modified(_)))
            .finish_non_exhaustive()
    }
}

impl FilledForm {
    pub fn report(&self) -> FillReport {
        self.report
    }

    /// Every marker found, in document order
    pub fn markers(&self) -> &[MarkerOccurrence] {
        &self.markers
    }

    /// Answers that were drawn, with their positions
    pub fn placed(&self) -> &[PlacedAnswer] {
        &self.placed
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, FormFillError> {
        match &mut self.output {
            FilledOutput::Unchanged(bytes) => Ok(bytes.clone()),
            FilledOutput::Modified(form) => form.to_bytes(),
        }
    }

    /// Write the filled PDF to `path`
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), FormFillError> {
        match &mut self.output {
            FilledOutput::Unchanged(bytes) => std::fs::write(path, bytes)
                .map_err(|e| FormFillError::WriteError(e.to_string())),
            FilledOutput::Modified(form) => form.save(path),
        }
    }
}
