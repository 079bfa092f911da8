use std::io::{BufRead, Write};

use bytemuck::Zeroable;
use itertools::Itertools;

use crate::{FormatError, GaussianShDegree};

/// The POD representation of Gaussian in PLY format.
///
/// Fields are stored as arrays because using glam types would add padding
/// according to C alignment rules.
///
/// [`PlyGaussianPod::sh`] holds the `f_rest_*` properties in file order, so its layout depends on
/// the SH degree of the file, see [`GaussianShDegree::rest_per_channel`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlyGaussianPod {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub sh: [f32; 3 * 15],
    pub alpha: f32,
    pub scale: [f32; 3],
    pub rot: [f32; 4],
}

impl PlyGaussianPod {
    /// Set the value of a property by name.
    ///
    /// Returns `false` if the property is not a Gaussian property.
    pub fn set_value(&mut self, name: &str, value: f32) -> bool {
        let slot = match name {
            "x" => &mut self.pos[0],
            "y" => &mut self.pos[1],
            "z" => &mut self.pos[2],
            "nx" => &mut self.normal[0],
            "ny" => &mut self.normal[1],
            "nz" => &mut self.normal[2],
            "f_dc_0" => &mut self.color[0],
            "f_dc_1" => &mut self.color[1],
            "f_dc_2" => &mut self.color[2],
            "opacity" => &mut self.alpha,
            "scale_0" => &mut self.scale[0],
            "scale_1" => &mut self.scale[1],
            "scale_2" => &mut self.scale[2],
            "rot_0" => &mut self.rot[0],
            "rot_1" => &mut self.rot[1],
            "rot_2" => &mut self.rot[2],
            "rot_3" => &mut self.rot[3],
            _ => match rest_index(name).and_then(|i| self.sh.get_mut(i)) {
                Some(slot) => slot,
                None => return false,
            },
        };

        *slot = value;
        true
    }

    /// Check if `name` is a property of [`PlyGaussianPod`].
    pub fn is_gaussian_property(name: &str) -> bool {
        PlyGaussianPod::zeroed().set_value(name, 0.0)
    }
}

/// Parse the index of a `f_rest_*` property name.
fn rest_index(name: &str) -> Option<usize> {
    name.strip_prefix("f_rest_")?.parse().ok()
}

impl ply_rs::ply::PropertyAccess for PlyGaussianPod {
    fn new() -> Self {
        PlyGaussianPod::zeroed()
    }

    fn set_property(&mut self, property_name: String, property: ply_rs::ply::Property) {
        let value = match property {
            ply_rs::ply::Property::Float(value) => value,
            ply_rs::ply::Property::Double(value) => value as f32,
            _ => {
                if Self::is_gaussian_property(&property_name) {
                    log::error!("Property {property_name} is not a float");
                }
                return;
            }
        };

        self.set_value(&property_name, value);
    }
}

/// Header of PLY file.
///
/// This represents the header parsed by [`PlyGaussians::read_ply_header`].
#[derive(Debug, Clone)]
pub enum PlyHeader {
    /// The Inria PLY format with all 45 `f_rest_*` properties.
    ///
    /// The number represents the number of Gaussians.
    ///
    /// This can be directly loaded into [`PlyGaussianPod`] by [`BufReader::read_exact`](std::io::Read::read_exact).
    Inria(usize),

    /// Custom PLY format.
    ///
    /// The SH degree is derived from the number of `f_rest_*` properties.
    Custom {
        header: ply_rs::ply::Header,
        sh_degree: GaussianShDegree,
    },
}

impl PlyHeader {
    /// Get the number of Gaussians.
    ///
    /// Returns [`None`] if the vertex element is not found in [`PlyHeader::Custom`].
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Inria(count) => Some(*count),
            Self::Custom { header, .. } => {
                header.elements.get("vertex").map(|vertex| vertex.count)
            }
        }
    }

    /// Get the SH degree of the Gaussians.
    pub fn sh_degree(&self) -> GaussianShDegree {
        match self {
            Self::Inria(..) => GaussianShDegree::default(),
            Self::Custom { sh_degree, .. } => *sh_degree,
        }
    }
}

/// PLY Gaussian [`Result`] iterator.
pub enum PlyGaussianIter<
    I: Iterator<Item = Result<PlyGaussianPod, FormatError>>,
    C: Iterator<Item = Result<PlyGaussianPod, FormatError>>,
> {
    /// The Inria PLY format.
    Inria(I),

    /// Custom PLY format.
    ///
    /// Properties are matched by name, so they may be in any order.
    Custom(C),
}

impl<
    I: Iterator<Item = Result<PlyGaussianPod, FormatError>>,
    C: Iterator<Item = Result<PlyGaussianPod, FormatError>>,
> Iterator for PlyGaussianIter<I, C>
{
    type Item = Result<PlyGaussianPod, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Inria(iter) => iter.next(),
            Self::Custom(iter) => iter.next(),
        }
    }
}

pub(crate) const SYSTEM_ENDIANNESS: ply_rs::ply::Encoding = match cfg!(target_endian = "little") {
    true => ply_rs::ply::Encoding::BinaryLittleEndian,
    false => ply_rs::ply::Encoding::BinaryBigEndian,
};

/// The raw Gaussians of a PLY file.
#[derive(Debug, Default, Clone)]
pub struct PlyGaussians {
    /// The Gaussian records.
    pub gaussians: Vec<PlyGaussianPod>,

    /// The SH degree, which decides the layout of [`PlyGaussianPod::sh`].
    pub sh_degree: GaussianShDegree,
}

impl PlyGaussians {
    /// The list of properties of the Inria PLY format.
    pub const PLY_PROPERTIES: &[&str] = &[
        "x", "y", "z", "nx", "ny", "nz", "f_dc_0", "f_dc_1", "f_dc_2", "f_rest_0", "f_rest_1",
        "f_rest_2", "f_rest_3", "f_rest_4", "f_rest_5", "f_rest_6", "f_rest_7", "f_rest_8",
        "f_rest_9", "f_rest_10", "f_rest_11", "f_rest_12", "f_rest_13", "f_rest_14", "f_rest_15",
        "f_rest_16", "f_rest_17", "f_rest_18", "f_rest_19", "f_rest_20", "f_rest_21", "f_rest_22",
        "f_rest_23", "f_rest_24", "f_rest_25", "f_rest_26", "f_rest_27", "f_rest_28", "f_rest_29",
        "f_rest_30", "f_rest_31", "f_rest_32", "f_rest_33", "f_rest_34", "f_rest_35", "f_rest_36",
        "f_rest_37", "f_rest_38", "f_rest_39", "f_rest_40", "f_rest_41", "f_rest_42", "f_rest_43",
        "f_rest_44", "opacity", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2",
        "rot_3",
    ];

    /// Upper bound of the records preallocated from the declared vertex count.
    pub const MAX_PREALLOCATED_COUNT: usize = 1 << 20;

    /// The properties every Gaussian PLY must declare.
    pub const REQUIRED_PROPERTIES: &[&str] = &[
        "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
        "rot_0", "rot_1", "rot_2", "rot_3",
    ];

    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Iterate over the Gaussians.
    pub fn iter(&self) -> impl Iterator<Item = &PlyGaussianPod> {
        self.gaussians.iter()
    }

    /// Read a PLY from file.
    pub fn read_ply_file(path: impl AsRef<std::path::Path>) -> Result<Self, FormatError> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read_ply(&mut reader)
    }

    /// Read a PLY from buffer.
    ///
    /// See [`PlyGaussians::PLY_PROPERTIES`] for a list of expected properties.
    pub fn read_ply(reader: &mut impl BufRead) -> Result<Self, FormatError> {
        let ply_header = Self::read_ply_header(reader)?;
        let sh_degree = ply_header.sh_degree();

        let count = ply_header
            .count()
            .ok_or(FormatError::VertexElementNotFound)?;
        let mut gaussians = Vec::with_capacity(count.min(Self::MAX_PREALLOCATED_COUNT));

        for gaussian in Self::read_ply_gaussians(reader, ply_header)? {
            gaussians.push(gaussian?);
        }

        Ok(Self {
            gaussians,
            sh_degree,
        })
    }

    /// Read and validate a PLY header.
    ///
    /// Returns [`FormatError::MissingProperty`] if any of [`PlyGaussians::REQUIRED_PROPERTIES`] is
    /// absent, and [`FormatError::UnsupportedShCoefficientCount`] if the number of `f_rest_*`
    /// properties does not correspond to an SH degree.
    pub fn read_ply_header(reader: &mut impl BufRead) -> Result<PlyHeader, FormatError> {
        let parser = ply_rs::parser::Parser::<ply_rs::ply::DefaultElement>::new();
        let header = parser.read_header(reader)?;
        let vertex = header
            .elements
            .get("vertex")
            .ok_or(FormatError::VertexElementNotFound)?;

        if let Some(name) = Self::REQUIRED_PROPERTIES
            .iter()
            .find(|name| !vertex.properties.contains_key(**name))
        {
            return Err(FormatError::MissingProperty { name: *name });
        }

        let rest_count = vertex
            .properties
            .keys()
            .filter(|name| rest_index(name).is_some())
            .count();
        let sh_degree = GaussianShDegree::from_rest_count(rest_count)
            .ok_or(FormatError::UnsupportedShCoefficientCount { count: rest_count })?;

        let unknown = vertex
            .properties
            .keys()
            .filter(|name| !PlyGaussianPod::is_gaussian_property(name))
            .join(", ");
        if !unknown.is_empty() {
            log::warn!("Ignoring unknown properties: {unknown}");
        }

        let is_inria = vertex.properties.len() == Self::PLY_PROPERTIES.len()
            && vertex
                .properties
                .iter()
                .zip(Self::PLY_PROPERTIES.iter())
                .all(|((a, property), b)| {
                    a == *b
                        && property.data_type
                            == ply_rs::ply::PropertyType::Scalar(ply_rs::ply::ScalarType::Float)
                })
            && header.encoding == SYSTEM_ENDIANNESS;

        Ok(match is_inria {
            true => PlyHeader::Inria(vertex.count),
            false => PlyHeader::Custom { header, sh_degree },
        })
    }

    /// Read the PLY Gaussians into [`PlyGaussianPod`].
    ///
    /// `header` may be parsed by calling [`PlyGaussians::read_ply_header`].
    pub fn read_ply_gaussians(
        reader: &mut impl BufRead,
        header: PlyHeader,
    ) -> Result<impl Iterator<Item = Result<PlyGaussianPod, FormatError>>, FormatError> {
        let count = header.count().ok_or(FormatError::VertexElementNotFound)?;
        log::info!("Reading PLY format with {count} Gaussians");

        Ok(match header {
            PlyHeader::Inria(..) => {
                PlyGaussianIter::Inria((0..count).map(|_| -> Result<_, FormatError> {
                    let mut gaussian = PlyGaussianPod::zeroed();
                    reader.read_exact(bytemuck::bytes_of_mut(&mut gaussian))?;
                    Ok(gaussian)
                }))
            }
            PlyHeader::Custom { header, .. } => {
                let parser = ply_rs::parser::Parser::<PlyGaussianPod>::new();

                PlyGaussianIter::Custom((0..count).map(move |_| -> Result<_, FormatError> {
                    let vertex = header
                        .elements
                        .get("vertex")
                        .ok_or(FormatError::VertexElementNotFound)?;
                    Ok(match header.encoding {
                        ply_rs::ply::Encoding::Ascii => {
                            let mut line = String::new();
                            reader.read_line(&mut line)?;

                            let mut gaussian = PlyGaussianPod::zeroed();
                            vertex
                                .properties
                                .keys()
                                .zip(
                                    line.split_whitespace()
                                        .map(|s| Some(s.parse::<f32>()))
                                        .chain(std::iter::repeat(None)),
                                )
                                .try_for_each(|(name, value)| match value {
                                    Some(Ok(value)) => {
                                        gaussian.set_value(name, value);
                                        Ok(())
                                    }
                                    Some(Err(_)) | None => Err(FormatError::InvalidPropertyValue),
                                })?;

                            gaussian
                        }
                        ply_rs::ply::Encoding::BinaryLittleEndian => {
                            parser.read_little_endian_element(reader, vertex)?
                        }
                        ply_rs::ply::Encoding::BinaryBigEndian => {
                            parser.read_big_endian_element(reader, vertex)?
                        }
                    })
                }))
            }
        })
    }

    /// Write the Gaussians to a PLY file.
    pub fn write_ply_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), std::io::Error> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_ply(&mut writer)?;
        writer.flush()
    }

    /// Write the Gaussians to a PLY buffer.
    ///
    /// The output is binary in system endianness, with as many `f_rest_*` properties as
    /// [`PlyGaussians::sh_degree`] requires.
    pub fn write_ply(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        let rest_count = 3 * self.sh_degree.rest_per_channel();

        writeln!(writer, "ply")?;
        writeln!(writer, "format {SYSTEM_ENDIANNESS} 1.0")?;
        writeln!(writer, "element vertex {}", self.gaussians.len())?;
        for property in Self::PLY_PROPERTIES
            .iter()
            .filter(|name| rest_index(name).is_none_or(|i| i < rest_count))
        {
            writeln!(writer, "property float {property}")?;
        }
        writeln!(writer, "end_header")?;

        if rest_count == 45 {
            return self
                .gaussians
                .iter()
                .try_for_each(|gaussian| writer.write_all(bytemuck::bytes_of(gaussian)));
        }

        self.gaussians.iter().try_for_each(|gaussian| {
            let mut values = gaussian
                .pos
                .iter()
                .chain(&gaussian.normal)
                .chain(&gaussian.color)
                .chain(&gaussian.sh[..rest_count])
                .chain(std::iter::once(&gaussian.alpha))
                .chain(&gaussian.scale)
                .chain(&gaussian.rot);
            values.try_for_each(|value| writer.write_all(&value.to_ne_bytes()))
        })
    }
}
