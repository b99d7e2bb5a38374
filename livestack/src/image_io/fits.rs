use std::path::{Path, PathBuf};

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};

use super::{HeaderCard, HeaderValue, ImageCodec, ImageIoError, PixelSource};

/// FITS codec backed by cfitsio.
///
/// Reads the primary HDU of 2D images row by row. Integer data is normalized
/// to `[0,1]` by the maximum of its BITPIX type; float data is taken as
/// already normalized. Writes 32-bit float images.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsCodec;

impl ImageCodec for FitsCodec {
    fn open(&self, path: &Path) -> Result<Box<dyn PixelSource>, ImageIoError> {
        Ok(Box::new(FitsPixelSource::open(path)?))
    }

    fn write(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        pixels: &[f32],
        headers: &[HeaderCard],
    ) -> Result<(), ImageIoError> {
        let fits_err = |source| ImageIoError::Fits {
            path: path.to_path_buf(),
            source,
        };

        // fitsio refuses to overwrite existing files
        common::file_utils::remove_file_if_exists(path).map_err(|source| ImageIoError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let description = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &[height, width],
        };

        let mut fptr = FitsFile::create(path)
            .with_custom_primary(&description)
            .open()
            .map_err(fits_err)?;
        let hdu = fptr.primary_hdu().map_err(fits_err)?;

        hdu.write_image(&mut fptr, pixels).map_err(fits_err)?;

        for card in headers {
            let key = card.key.as_str();
            match &card.value {
                HeaderValue::Int(v) => hdu.write_key(&mut fptr, key, *v),
                HeaderValue::Float(v) => hdu.write_key(&mut fptr, key, *v),
                HeaderValue::Text(v) => hdu.write_key(&mut fptr, key, v.as_str()),
            }
            .map_err(fits_err)?;
        }

        Ok(())
    }
}

/// Open FITS file positioned on its primary image HDU.
pub struct FitsPixelSource {
    path: PathBuf,
    fptr: FitsFile,
    hdu: FitsHdu,
    width: usize,
    height: usize,
    scale: f32,
}

impl FitsPixelSource {
    pub fn open(path: &Path) -> Result<Self, ImageIoError> {
        let fits_err = |source| ImageIoError::Fits {
            path: path.to_path_buf(),
            source,
        };

        let mut fptr = FitsFile::open(path).map_err(fits_err)?;
        let hdu = fptr.primary_hdu().map_err(fits_err)?;

        let (shape, image_type) = match &hdu.info {
            HduInfo::ImageInfo { shape, image_type } => (shape.clone(), image_type.clone()),
            HduInfo::TableInfo { .. } => {
                return Err(ImageIoError::UnsupportedLayout {
                    path: path.to_path_buf(),
                    reason: "primary HDU is a table".to_string(),
                });
            }
            HduInfo::AnyInfo => {
                return Err(ImageIoError::UnsupportedLayout {
                    path: path.to_path_buf(),
                    reason: "unknown HDU type".to_string(),
                });
            }
        };

        // fitsio reports shape as [NAXIS2, NAXIS1] = [height, width]
        let (width, height) = match shape.as_slice() {
            [height, width] => (*width, *height),
            other => {
                return Err(ImageIoError::UnsupportedLayout {
                    path: path.to_path_buf(),
                    reason: format!("expected a 2D image, got {} axes", other.len()),
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            fptr,
            hdu,
            width,
            height,
            scale: 1.0 / normalization_max(image_type),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PixelSource for FitsPixelSource {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f32>, ImageIoError> {
        if row >= self.height {
            return Err(ImageIoError::RowOutOfRange {
                row,
                height: self.height,
            });
        }

        let mut pixels: Vec<f32> = self
            .hdu
            .read_rows(&mut self.fptr, row, 1)
            .map_err(|source| ImageIoError::Fits {
                path: self.path.clone(),
                source,
            })?;

        for p in pixels.iter_mut() {
            *p = if p.is_finite() { *p * self.scale } else { 0.0 };
        }
        Ok(pixels)
    }

    fn read_header_f64(&mut self, key: &str) -> Option<f64> {
        self.hdu.read_key::<f64>(&mut self.fptr, key).ok()
    }
}

/// Maximum representable value of the stored data type.
///
/// cfitsio applies BZERO/BSCALE, so unsigned types arrive in their natural
/// range. Float data is assumed to be normalized already.
fn normalization_max(image_type: ImageType) -> f32 {
    match image_type {
        ImageType::UnsignedByte | ImageType::Byte => u8::MAX as f32,
        ImageType::Short => i16::MAX as f32,
        ImageType::UnsignedShort => u16::MAX as f32,
        ImageType::Long => i32::MAX as f32,
        ImageType::UnsignedLong => u32::MAX as f32,
        ImageType::LongLong => i64::MAX as f32,
        ImageType::Float | ImageType::Double => 1.0,
    }
}
