use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use bytemuck::Zeroable;
use glam::*;

use crate::{FormatError, WritePointCloudError, ply::SYSTEM_ENDIANNESS};

/// The POD representation of a colored point in PLY format.
///
/// This is packed to match the 15 byte PLY record, so fields must be copied out before use, see
/// [`PlyPointPod::pos`] and [`PlyPointPod::color`].
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlyPointPod {
    pub pos: [f32; 3],
    pub color: [u8; 3],
}

impl PlyPointPod {
    /// Create a new point.
    pub fn new(pos: Vec3, color: U8Vec3) -> Self {
        Self {
            pos: pos.to_array(),
            color: color.to_array(),
        }
    }

    /// Get the position.
    pub fn pos(&self) -> Vec3 {
        Vec3::from_array(self.pos)
    }

    /// Get the color.
    pub fn color(&self) -> U8Vec3 {
        U8Vec3::from_array(self.color)
    }
}

impl ply_rs::ply::PropertyAccess for PlyPointPod {
    fn new() -> Self {
        PlyPointPod::zeroed()
    }

    fn set_property(&mut self, property_name: String, property: ply_rs::ply::Property) {
        use ply_rs::ply::Property;

        let (mut pos, mut color) = (self.pos, self.color);
        match (property_name.as_str(), property) {
            ("x", Property::Float(v)) => pos[0] = v,
            ("y", Property::Float(v)) => pos[1] = v,
            ("z", Property::Float(v)) => pos[2] = v,
            ("x", Property::Double(v)) => pos[0] = v as f32,
            ("y", Property::Double(v)) => pos[1] = v as f32,
            ("z", Property::Double(v)) => pos[2] = v as f32,
            ("red", Property::UChar(v)) => color[0] = v,
            ("green", Property::UChar(v)) => color[1] = v,
            ("blue", Property::UChar(v)) => color[2] = v,
            (name @ ("x" | "y" | "z" | "red" | "green" | "blue"), _) => {
                log::error!("Property {name} has an unexpected type");
            }
            _ => {}
        }
        self.pos = pos;
        self.color = color;
    }
}

/// The properties of a point, in record order.
pub const POINT_PROPERTIES: &[(&str, &str)] = &[
    ("float", "x"),
    ("float", "y"),
    ("float", "z"),
    ("uchar", "red"),
    ("uchar", "green"),
    ("uchar", "blue"),
];

/// Streams points into a PLY buffer.
///
/// The number of points is declared in the header up front, and [`PointCloudWriter::finish`]
/// checks that exactly that many were written.
#[derive(Debug)]
pub struct PointCloudWriter<W: Write> {
    writer: W,
    declared: u64,
    written: u64,
}

impl<W: Write> PointCloudWriter<W> {
    /// Create a new writer and write the header for `count` points.
    pub fn new(mut writer: W, count: u64) -> Result<Self, WritePointCloudError> {
        writeln!(writer, "ply")?;
        writeln!(writer, "format {SYSTEM_ENDIANNESS} 1.0")?;
        writeln!(writer, "element vertex {count}")?;
        for (ty, name) in POINT_PROPERTIES {
            writeln!(writer, "property {ty} {name}")?;
        }
        writeln!(writer, "end_header")?;

        Ok(Self {
            writer,
            declared: count,
            written: 0,
        })
    }

    /// Write a batch of points.
    ///
    /// Returns [`WritePointCloudError::Overflow`] if this would exceed the declared count.
    pub fn write_points(&mut self, points: &[PlyPointPod]) -> Result<(), WritePointCloudError> {
        let written = self.written + points.len() as u64;
        if written > self.declared {
            return Err(WritePointCloudError::Overflow {
                declared: self.declared,
            });
        }

        self.writer.write_all(bytemuck::cast_slice(points))?;
        self.written = written;
        Ok(())
    }

    /// Get the number of points declared in the header.
    pub fn declared(&self) -> u64 {
        self.declared
    }

    /// Get the number of points written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the inner writer.
    ///
    /// Returns [`WritePointCloudError::CountMismatch`] if fewer points than declared were
    /// written.
    pub fn finish(mut self) -> Result<W, WritePointCloudError> {
        if self.written != self.declared {
            return Err(WritePointCloudError::CountMismatch {
                written: self.written,
                declared: self.declared,
            });
        }

        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Streams points into a PLY file.
///
/// Points go to a `.partial` sibling of the path, which is only renamed to the path by
/// [`PointCloudFileWriter::finish`]. Dropping the writer before that removes the partial file.
#[derive(Debug)]
pub struct PointCloudFileWriter {
    inner: Option<PointCloudWriter<std::io::BufWriter<std::fs::File>>>,
    partial: PathBuf,
    path: PathBuf,
}

impl PointCloudFileWriter {
    /// Create the partial file and write the header for `count` points.
    pub fn create(path: impl AsRef<Path>, count: u64) -> Result<Self, WritePointCloudError> {
        let path = path.as_ref().to_path_buf();
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let file = std::fs::File::create(&partial)?;
        let inner = PointCloudWriter::new(std::io::BufWriter::new(file), count)?;

        Ok(Self {
            inner: Some(inner),
            partial,
            path,
        })
    }

    /// Get the path of the partial file.
    pub fn partial_path(&self) -> &Path {
        &self.partial
    }

    /// Write a batch of points, see [`PointCloudWriter::write_points`].
    pub fn write_points(&mut self, points: &[PlyPointPod]) -> Result<(), WritePointCloudError> {
        match self.inner.as_mut() {
            Some(inner) => inner.write_points(points),
            None => Ok(()),
        }
    }

    /// Finish writing and move the file to its path.
    ///
    /// The partial file is removed if this fails.
    pub fn finish(mut self) -> Result<(), WritePointCloudError> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };

        Self::persist(inner, &self.partial, &self.path).inspect_err(|_| {
            let _ = std::fs::remove_file(&self.partial);
        })
    }

    fn persist(
        inner: PointCloudWriter<std::io::BufWriter<std::fs::File>>,
        partial: &Path,
        path: &Path,
    ) -> Result<(), WritePointCloudError> {
        let file = inner.finish()?.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        std::fs::rename(partial, path)?;
        Ok(())
    }
}

impl Drop for PointCloudFileWriter {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

/// A point cloud read from a PLY file.
#[derive(Debug, Default, Clone)]
pub struct PlyPoints(pub Vec<PlyPointPod>);

impl PlyPoints {
    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no points.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the points.
    pub fn iter(&self) -> impl Iterator<Item = &PlyPointPod> {
        self.0.iter()
    }

    /// Read a point PLY from file.
    pub fn read_ply_file(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read_ply(&mut reader)
    }

    /// Read a point PLY from buffer.
    ///
    /// Any encoding is accepted, only `x`, `y`, `z` are required. Missing colors are black.
    pub fn read_ply(reader: &mut impl BufRead) -> Result<Self, FormatError> {
        let parser = ply_rs::parser::Parser::<PlyPointPod>::new();
        let header = parser.read_header(reader)?;
        let vertex = header
            .elements
            .get("vertex")
            .ok_or(FormatError::VertexElementNotFound)?;

        if let Some(name) = ["x", "y", "z"]
            .into_iter()
            .find(|name| !vertex.properties.contains_key(*name))
        {
            return Err(FormatError::MissingProperty { name });
        }

        let points = parser.read_payload_for_element(reader, vertex, &header)?;
        Ok(Self(points))
    }
}
