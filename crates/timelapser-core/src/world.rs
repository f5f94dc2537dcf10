use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dist_sq(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A position plus first-person orientation. Yaw and pitch are radians, as the game
/// session reports them.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub yaw: f64,
    pub pitch: f64,
}

impl Pose {
    pub fn new(position: Vec3, yaw: f64, pitch: f64) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Builds a pose only when every component is present. Zero is a valid value.
    pub fn from_parts(position: Option<Vec3>, yaw: Option<f64>, pitch: Option<f64>) -> Option<Self> {
        Some(Self {
            position: position?,
            yaw: yaw?,
            pitch: pitch?,
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Mob,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    /// Username for players, type name (e.g. `zombie`) for mobs.
    pub name: String,
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
}

impl Entity {
    pub fn pose(&self) -> Option<Pose> {
        Pose::from_parts(self.position, self.yaw, self.pitch)
    }
}

/// Entities visible to the agent at one instant. The agent itself is not listed.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub self_position: Option<Vec3>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl WorldSnapshot {
    /// Nearest entity of `kind` to the agent; `name` filters case-insensitively.
    ///
    /// Entities without a known position sort last. Without a self position the first
    /// match in snapshot order wins.
    pub fn nearest(&self, kind: EntityKind, name: Option<&str>) -> Option<&Entity> {
        let mut matches = self.entities.iter().filter(|e| {
            e.kind == kind
                && name
                    .map(|n| e.name.to_lowercase() == n.to_lowercase())
                    .unwrap_or(true)
        });

        let Some(origin) = self.self_position else {
            return matches.next();
        };
        let dist = |e: &Entity| {
            e.position
                .map(|p| p.dist_sq(&origin))
                .unwrap_or(f64::INFINITY)
        };
        matches.min_by(|a, b| {
            dist(a)
                .partial_cmp(&dist(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
