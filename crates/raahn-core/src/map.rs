//! Map files: world size, the car's start pose and static geometry

use std::path::Path;

use anyhow::{Context, Result};
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, LineSegment};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotConfig {
    pub x: f64,
    pub y: f64,
    /// Initial heading in degrees
    #[serde(default)]
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub width: f64,
    pub height: f64,
    pub robot: RobotConfig,
    /// `((x1, y1), (x2, y2))`
    #[serde(default)]
    pub walls: Vec<((f64, f64), (f64, f64))>,
    /// `(x, y, width, height)`
    #[serde(default)]
    pub roads: Vec<(f64, f64, f64, f64)>,
    #[serde(default)]
    pub points: Vec<(f64, f64)>,
    /// Half extents of the car's collision query window
    #[serde(default)]
    pub collision_window: Option<(f64, f64)>,
}

impl MapConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read map file: {}", path.display()))?;

        Self::from_ron(&content)
            .with_context(|| format!("Failed to parse RON map: {}", path.display()))
    }

    pub fn from_ron(text: &str) -> Result<Self> {
        let map = ron::from_str(text).context("Invalid map definition")?;
        Ok(map)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize map to RON")?;

        std::fs::write(path.as_ref(), ron)
            .with_context(|| format!("Failed to write map file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// World rectangle anchored at the origin
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.width, self.height)
    }

    /// Smallest box holding the world rectangle, the start position and all geometry
    pub fn extent(&self) -> Aabb {
        let (start, _) = self.start();
        let walls = self.wall_segments().map(|segment| segment.bounds());
        let points = self.point_positions().map(|p| Aabb::from_min_max(p, p));
        walls
            .chain(self.road_boxes())
            .chain(points)
            .fold(self.bounds().union(&Aabb::from_min_max(start, start)), |acc, aabb| {
                acc.union(&aabb)
            })
    }

    pub fn start(&self) -> (DVec2, f64) {
        (DVec2::new(self.robot.x, self.robot.y), self.robot.angle)
    }

    pub fn wall_segments(&self) -> impl Iterator<Item = LineSegment> + '_ {
        self.walls
            .iter()
            .map(|&((x1, y1), (x2, y2))| LineSegment::new(DVec2::new(x1, y1), DVec2::new(x2, y2)))
    }

    pub fn road_boxes(&self) -> impl Iterator<Item = Aabb> + '_ {
        self.roads
            .iter()
            .map(|&(x, y, w, h)| Aabb::from_position_size(DVec2::new(x, y), DVec2::new(w, h)))
    }

    pub fn point_positions(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.points.iter().map(|&(x, y)| DVec2::new(x, y))
    }
}
