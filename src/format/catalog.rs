use crate::errors::CaptureError;
use crate::platform::SessionBackend;
use crate::types::{AspectRatioTarget, CaptureFormat, LensIdentity};

/// Formats offered by one lens, in the order the device reports them.
///
/// A catalog is a point-in-time copy: querying again returns whatever the
/// device currently exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatCatalog {
    lens: LensIdentity,
    formats: Vec<CaptureFormat>,
}

impl FormatCatalog {
    /// Query the backend. Only fails when the lens device is unavailable.
    pub fn query<B: SessionBackend + ?Sized>(
        backend: &B,
        lens: LensIdentity,
    ) -> Result<Self, CaptureError> {
        let formats = backend.formats(lens)?;
        log::debug!("{} lens reports {} formats", lens, formats.len());
        Ok(Self { lens, formats })
    }

    pub fn from_formats(lens: LensIdentity, formats: Vec<CaptureFormat>) -> Self {
        Self { lens, formats }
    }

    pub fn lens(&self) -> LensIdentity {
        self.lens
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CaptureFormat> {
        self.formats.iter()
    }

    pub fn supporting_frame_rate(&self, rate: f64) -> impl Iterator<Item = &CaptureFormat> + '_ {
        self.formats.iter().filter(move |f| f.supports_frame_rate(rate))
    }

    pub fn matching_aspect(
        &self,
        target: AspectRatioTarget,
        tolerance: f64,
    ) -> impl Iterator<Item = &CaptureFormat> + '_ {
        self.formats
            .iter()
            .filter(move |f| target.matches(f.width, f.height, tolerance))
    }

    /// Stable sort of references; equal elements keep device order.
    pub fn sorted_by<F>(&self, mut compare: F) -> Vec<&CaptureFormat>
    where
        F: FnMut(&CaptureFormat, &CaptureFormat) -> std::cmp::Ordering,
    {
        let mut formats: Vec<&CaptureFormat> = self.formats.iter().collect();
        formats.sort_by(|a, b| compare(a, b));
        formats
    }

    pub fn into_formats(self) -> Vec<CaptureFormat> {
        self.formats
    }
}

impl<'a> IntoIterator for &'a FormatCatalog {
    type Item = &'a CaptureFormat;
    type IntoIter = std::slice::Iter<'a, CaptureFormat>;

    fn into_iter(self) -> Self::IntoIter {
        self.formats.iter()
    }
}

/// List the formats of a lens.
pub fn list_formats<B: SessionBackend + ?Sized>(
    backend: &B,
    lens: LensIdentity,
) -> Result<Vec<CaptureFormat>, CaptureError> {
    FormatCatalog::query(backend, lens).map(FormatCatalog::into_formats)
}
