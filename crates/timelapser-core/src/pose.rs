//! Turning a command's `<type> <target>` arguments into a pose or position.

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::world::{EntityKind, Pose, Vec3, WorldSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Player,
    Mob,
    Absolute,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Player => "player",
            TargetKind::Mob => "mob",
            TargetKind::Absolute => "abs",
        }
    }

    fn entity_kind(self) -> Option<EntityKind> {
        match self {
            TargetKind::Player => Some(EntityKind::Player),
            TargetKind::Mob => Some(EntityKind::Mob),
            TargetKind::Absolute => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(TargetKind::Player),
            "mob" => Ok(TargetKind::Mob),
            "abs" => Ok(TargetKind::Absolute),
            other => Err(CommandError::parse(format!(
                "unknown target type '{other}' (expected player, mob or abs)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub kind: TargetKind,
    pub name: Option<String>,
    pub raw_coords: Option<String>,
}

impl TargetSpec {
    /// Applies the command defaults: type `player`, and for players the invoking user
    /// when no target name was given.
    pub fn from_args(
        kind: Option<&str>,
        target: Option<&str>,
        invoker: &str,
    ) -> Result<Self, CommandError> {
        let kind = match kind {
            Some(k) => k.parse()?,
            None => TargetKind::Player,
        };
        let spec = match kind {
            TargetKind::Absolute => TargetSpec {
                kind,
                name: None,
                raw_coords: target.map(str::to_string),
            },
            TargetKind::Player => TargetSpec {
                kind,
                name: Some(target.unwrap_or(invoker).to_string()),
                raw_coords: None,
            },
            TargetKind::Mob => TargetSpec {
                kind,
                name: target.map(str::to_string),
                raw_coords: None,
            },
        };
        Ok(spec)
    }

    pub fn needs_world(&self) -> bool {
        self.kind != TargetKind::Absolute
    }

    /// What the user asked for, for feedback lines.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.raw_coords.clone())
            .unwrap_or_else(|| match self.kind {
                TargetKind::Mob => "any mob".to_string(),
                other => other.to_string(),
            })
    }
}

/// Literal coordinates in the form `x,y,z` with an optional `/yaw,pitch` suffix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteCoords {
    pub position: Vec3,
    pub rotation: Option<(f64, f64)>,
}

impl AbsoluteCoords {
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let (pos_part, rot_part) = match raw.split_once('/') {
            Some((pos, rot)) => (pos, Some(rot)),
            None => (raw, None),
        };

        let [x, y, z] = parse_components::<3>(pos_part, "position <x>,<y>,<z>")?;
        let rotation = match rot_part {
            Some(rot) => {
                let [yaw, pitch] = parse_components::<2>(rot, "rotation <yaw>,<pitch>")?;
                Some((yaw, pitch))
            }
            None => None,
        };

        Ok(Self {
            position: Vec3::new(x, y, z),
            rotation,
        })
    }

    pub fn pose(&self) -> Option<Pose> {
        let (yaw, pitch) = self.rotation?;
        Some(Pose::new(self.position, yaw, pitch))
    }
}

fn parse_components<const N: usize>(raw: &str, what: &str) -> Result<[f64; N], CommandError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != N {
        return Err(CommandError::parse(format!(
            "{what}: expected {N} numbers, got '{raw}'"
        )));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CommandError::parse(format!("{what}: '{part}' is not a number")))?;
    }
    Ok(out)
}

/// Resolves target specs against a world snapshot.
pub struct PoseResolver;

impl PoseResolver {
    /// Full pose for `spec`. Absolute targets must carry a rotation; entities must
    /// report position, yaw and pitch.
    pub fn resolve(spec: &TargetSpec, world: &WorldSnapshot) -> Result<Pose, CommandError> {
        match spec.kind.entity_kind() {
            None => {
                let coords = Self::absolute(spec)?;
                coords
                    .pose()
                    .ok_or_else(|| CommandError::IncompletePose(spec.label()))
            }
            Some(kind) => world
                .nearest(kind, spec.name.as_deref())
                .and_then(|e| e.pose())
                .ok_or_else(|| CommandError::not_found(spec.kind.as_str(), spec.label())),
        }
    }

    /// Position only; any rotation suffix on absolute coordinates is ignored.
    pub fn resolve_position(
        spec: &TargetSpec,
        world: &WorldSnapshot,
    ) -> Result<Vec3, CommandError> {
        match spec.kind.entity_kind() {
            None => Ok(Self::absolute(spec)?.position),
            Some(kind) => world
                .nearest(kind, spec.name.as_deref())
                .and_then(|e| e.position)
                .ok_or_else(|| CommandError::not_found(spec.kind.as_str(), spec.label())),
        }
    }

    fn absolute(spec: &TargetSpec) -> Result<AbsoluteCoords, CommandError> {
        let raw = spec
            .raw_coords
            .as_deref()
            .ok_or_else(|| CommandError::parse("abs needs <x>,<y>,<z>[/<yaw>,<pitch>]"))?;
        AbsoluteCoords::parse(raw)
    }
}
