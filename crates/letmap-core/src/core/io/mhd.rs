use crate::core::geometry::{GeometryError, GridGeometry};
use crate::core::image::VoxelImage;
use crate::core::io::traits::ImageFile;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Header parse error on line {line}: {kind}")]
    Parse { line: usize, kind: HeaderParseErrorKind },
    #[error("Missing required header key: {0}")]
    MissingKey(&'static str),
    #[error("Unsupported image: {0}")]
    Unsupported(String),
    #[error("Payload holds {found} bytes, expected {expected}")]
    PayloadSize { expected: usize, found: usize },
    #[error("Invalid grid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum HeaderParseErrorKind {
    #[error("Expected 'Key = Value', found '{0}'")]
    MalformedLine(String),
    #[error("Invalid number in '{key}' (value: '{value}')")]
    InvalidNumber { key: String, value: String },
    #[error("'{key}' requires {expected} values, found {found}")]
    WrongArity {
        key: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Double,
    Float,
}

impl ElementType {
    fn size(self) -> usize {
        match self {
            ElementType::Double => 8,
            ElementType::Float => 4,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ElementType::Double => "MET_DOUBLE",
            ElementType::Float => "MET_FLOAT",
        }
    }
}

/// The subset of a MetaImage header needed to locate and decode a 3D scalar
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MhdHeader {
    pub resolution: Vector3<usize>,
    pub spacing: Vector3<f64>,
    /// Physical position of the centre of the first voxel.
    pub offset: Point3<f64>,
    pub element_type: ElementType,
    pub big_endian: bool,
    pub data_file: String,
}

impl MhdHeader {
    pub fn for_geometry(geometry: &GridGeometry, data_file: impl Into<String>) -> Self {
        Self {
            resolution: geometry.resolution(),
            spacing: geometry.spacing(),
            offset: geometry.first_voxel_center(),
            element_type: ElementType::Double,
            big_endian: false,
            data_file: data_file.into(),
        }
    }

    pub fn geometry(&self) -> Result<GridGeometry, GeometryError> {
        GridGeometry::from_spacing(self.resolution, self.spacing, self.offset)
    }

    pub fn voxel_count(&self) -> usize {
        self.resolution.iter().product()
    }
}

/// MetaImage codec: a text `.mhd` header next to a raw binary payload.
pub struct MetaImage;

impl MetaImage {
    /// Path of the raw payload written next to `header_path`.
    pub fn raw_path_for(header_path: &Path) -> PathBuf {
        header_path.with_extension("raw")
    }
}

impl ImageFile for MetaImage {
    type Error = ImageError;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<VoxelImage, Self::Error> {
        let header_path = path.as_ref();
        let mut reader = BufReader::new(File::open(header_path)?);
        let header = parse_header(&mut reader)?;
        let geometry = header.geometry()?;

        let data_path = header_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&header.data_file);
        let mut data_reader = BufReader::new(File::open(data_path)?);
        let values = read_payload(&mut data_reader, &header)?;

        let found = values.len();
        VoxelImage::from_data(geometry, values).ok_or(ImageError::PayloadSize {
            expected: header.voxel_count() * header.element_type.size(),
            found: found * header.element_type.size(),
        })
    }

    fn write_to_path<P: AsRef<Path>>(image: &VoxelImage, path: P) -> Result<(), Self::Error> {
        let header_path = path.as_ref();
        let raw_path = Self::raw_path_for(header_path);
        let data_file = raw_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ImageError::Unsupported(format!(
                    "output path '{}' has no file name",
                    header_path.display()
                ))
            })?;

        let header = MhdHeader::for_geometry(image.geometry(), data_file);
        let mut header_writer = BufWriter::new(File::create(header_path)?);
        write_header(&header, &mut header_writer)?;
        header_writer.flush()?;

        let mut data_writer = BufWriter::new(File::create(&raw_path)?);
        write_payload(image.values(), &mut data_writer)?;
        data_writer.flush()?;
        Ok(())
    }
}

pub fn parse_header(reader: &mut impl BufRead) -> Result<MhdHeader, ImageError> {
    let mut entries: HashMap<String, (usize, String)> = HashMap::new();

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(ImageError::Parse {
                line: line_num,
                kind: HeaderParseErrorKind::MalformedLine(trimmed.to_string()),
            });
        };
        entries.insert(
            key.trim().to_string(),
            (line_num, value.trim().to_string()),
        );
    }

    if let Some((line, value)) = entries.get("NDims") {
        let [ndims] = parse_values::<usize, 1>("NDims", *line, value)?;
        if ndims != 3 {
            return Err(ImageError::Unsupported(format!(
                "only 3D images are supported (NDims = {})",
                ndims
            )));
        }
    }
    if is_true(entries.get("CompressedData")) {
        return Err(ImageError::Unsupported(
            "compressed payloads are not supported".to_string(),
        ));
    }
    if let Some((line, value)) = entries.get("ElementNumberOfChannels") {
        let [channels] = parse_values::<usize, 1>("ElementNumberOfChannels", *line, value)?;
        if channels != 1 {
            return Err(ImageError::Unsupported(format!(
                "only scalar images are supported ({} channels)",
                channels
            )));
        }
    }

    let (line, value) = entries
        .get("DimSize")
        .ok_or(ImageError::MissingKey("DimSize"))?;
    let resolution = Vector3::from(parse_values::<usize, 3>("DimSize", *line, value)?);

    let spacing = match entries
        .get("ElementSpacing")
        .or_else(|| entries.get("ElementSize"))
    {
        Some((line, value)) => {
            Vector3::from(parse_values::<f64, 3>("ElementSpacing", *line, value)?)
        }
        None => Vector3::new(1.0, 1.0, 1.0),
    };

    let offset = match entries
        .get("Offset")
        .or_else(|| entries.get("Position"))
        .or_else(|| entries.get("Origin"))
    {
        Some((line, value)) => Point3::from(parse_values::<f64, 3>("Offset", *line, value)?),
        None => Point3::origin(),
    };

    let element_type = match entries.get("ElementType").map(|(_, v)| v.as_str()) {
        Some("MET_DOUBLE") => ElementType::Double,
        Some("MET_FLOAT") => ElementType::Float,
        Some(other) => {
            return Err(ImageError::Unsupported(format!(
                "element type '{}' (expected MET_DOUBLE or MET_FLOAT)",
                other
            )));
        }
        None => return Err(ImageError::MissingKey("ElementType")),
    };

    let big_endian = is_true(
        entries
            .get("BinaryDataByteOrderMSB")
            .or_else(|| entries.get("ElementByteOrderMSB")),
    );

    let data_file = entries
        .get("ElementDataFile")
        .map(|(_, v)| v.clone())
        .ok_or(ImageError::MissingKey("ElementDataFile"))?;
    if data_file.eq_ignore_ascii_case("LOCAL") {
        return Err(ImageError::Unsupported(
            "inline (LOCAL) payloads are not supported".to_string(),
        ));
    }

    Ok(MhdHeader {
        resolution,
        spacing,
        offset,
        element_type,
        big_endian,
        data_file,
    })
}

pub fn write_header(header: &MhdHeader, writer: &mut impl Write) -> io::Result<()> {
    let r = header.resolution;
    let s = header.spacing;
    let o = header.offset;
    writeln!(writer, "ObjectType = Image")?;
    writeln!(writer, "NDims = 3")?;
    writeln!(writer, "BinaryData = True")?;
    writeln!(
        writer,
        "BinaryDataByteOrderMSB = {}",
        if header.big_endian { "True" } else { "False" }
    )?;
    writeln!(writer, "CompressedData = False")?;
    writeln!(writer, "TransformMatrix = 1 0 0 0 1 0 0 0 1")?;
    writeln!(writer, "Offset = {} {} {}", o.x, o.y, o.z)?;
    writeln!(writer, "CenterOfRotation = 0 0 0")?;
    writeln!(writer, "AnatomicalOrientation = RAI")?;
    writeln!(writer, "ElementSpacing = {} {} {}", s.x, s.y, s.z)?;
    writeln!(writer, "DimSize = {} {} {}", r.x, r.y, r.z)?;
    writeln!(writer, "ElementType = {}", header.element_type.tag())?;
    writeln!(writer, "ElementDataFile = {}", header.data_file)?;
    Ok(())
}

/// Decodes the payload described by `header` from `reader`.
pub fn read_payload(reader: &mut impl Read, header: &MhdHeader) -> Result<Vec<f64>, ImageError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let size = header.element_type.size();
    let expected = header.voxel_count() * size;
    if bytes.len() != expected {
        return Err(ImageError::PayloadSize {
            expected,
            found: bytes.len(),
        });
    }

    let values = match (header.element_type, header.big_endian) {
        (ElementType::Double, false) => bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap_or_default()))
            .collect(),
        (ElementType::Double, true) => bytes
            .chunks_exact(8)
            .map(|c| f64::from_be_bytes(c.try_into().unwrap_or_default()))
            .collect(),
        (ElementType::Float, false) => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap_or_default()) as f64)
            .collect(),
        (ElementType::Float, true) => bytes
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes(c.try_into().unwrap_or_default()) as f64)
            .collect(),
    };
    Ok(values)
}

/// Encodes `values` as little-endian `f64`.
pub fn write_payload(values: &[f64], writer: &mut impl Write) -> io::Result<()> {
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn parse_values<T: FromStr, const N: usize>(
    key: &str,
    line: usize,
    value: &str,
) -> Result<[T; N], ImageError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != N {
        return Err(ImageError::Parse {
            line,
            kind: HeaderParseErrorKind::WrongArity {
                key: key.to_string(),
                expected: N,
                found: parts.len(),
            },
        });
    }
    let parsed = parts
        .iter()
        .map(|p| {
            p.parse::<T>().map_err(|_| ImageError::Parse {
                line,
                kind: HeaderParseErrorKind::InvalidNumber {
                    key: key.to_string(),
                    value: (*p).to_string(),
                },
            })
        })
        .collect::<Result<Vec<T>, _>>()?;
    parsed.try_into().map_err(|_| ImageError::Parse {
        line,
        kind: HeaderParseErrorKind::WrongArity {
            key: key.to_string(),
            expected: N,
            found: parts.len(),
        },
    })
}

fn is_true(entry: Option<&(usize, String)>) -> bool {
    entry.is_some_and(|(_, v)| v.eq_ignore_ascii_case("true"))
}
