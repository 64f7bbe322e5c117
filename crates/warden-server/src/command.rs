//! Admin console commands.

use warden_geom::{TilePos, TileRect};
use warden_zone::{ZoneId, ZoneType};

/// A parsed console line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Create {
        zone_type: ZoneType,
        name: Option<String>,
    },
    Expand {
        zone: ZoneId,
        rect: TileRect,
    },
    Shrink {
        zone: ZoneId,
        rect: TileRect,
    },
    Delete(ZoneId),
    Split(ZoneId),
    Rename {
        zone: ZoneId,
        name: String,
    },
    Clean {
        center: TilePos,
        radius: u32,
    },
    List,
    Save,
    Quit,
    Help,
    Unknown(String),
}

pub const HELP: &[&str] = &[
    "create <pvp|protected> [name]     - create an empty zone",
    "expand <id> <x> <y> <w> <h>       - add a rectangle to a zone",
    "shrink <id> <x> <y> <w> <h>       - remove a rectangle from a zone",
    "delete <id>                       - delete a zone",
    "split <id>                        - split a zone into connected parts",
    "rename <id> <name>                - rename a zone",
    "clean <x> <y> <radius>            - strip unclaimed barriers",
    "list                              - list zones",
    "save                              - save every level",
    "q, quit                           - save and quit",
];

/// Parse one console line. Anything malformed becomes [`Command::Unknown`].
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Command::Unknown(String::new());
    };
    let args: Vec<&str> = words.collect();

    let parsed = match verb.to_ascii_lowercase().as_str() {
        "create" => parse_create(&args),
        "expand" => parse_rect_edit(&args).map(|(zone, rect)| Command::Expand { zone, rect }),
        "shrink" => parse_rect_edit(&args).map(|(zone, rect)| Command::Shrink { zone, rect }),
        "delete" | "del" => single_zone(&args).map(Command::Delete),
        "split" => single_zone(&args).map(Command::Split),
        "rename" => parse_rename(&args),
        "clean" => parse_clean(&args),
        "list" | "l" => Some(Command::List),
        "save" => Some(Command::Save),
        "quit" | "q" => Some(Command::Quit),
        "help" | "h" | "?" => Some(Command::Help),
        _ => None,
    };
    parsed.unwrap_or_else(|| Command::Unknown(line.to_string()))
}

fn parse_zone_type(word: &str) -> Option<ZoneType> {
    match word.to_ascii_lowercase().as_str() {
        "pvp" => Some(ZoneType::Pvp),
        "protected" | "prot" => Some(ZoneType::Protected),
        _ => None,
    }
}

fn parse_create(args: &[&str]) -> Option<Command> {
    let (first, rest) = args.split_first()?;
    let zone_type = parse_zone_type(first)?;
    let name = (!rest.is_empty()).then(|| rest.join(" "));
    Some(Command::Create { zone_type, name })
}

fn parse_zone(word: &str) -> Option<ZoneId> {
    word.trim_start_matches('#').parse().ok().map(ZoneId)
}

fn single_zone(args: &[&str]) -> Option<ZoneId> {
    match args {
        [id] => parse_zone(id),
        _ => None,
    }
}

fn parse_rect_edit(args: &[&str]) -> Option<(ZoneId, TileRect)> {
    let [id, x, y, w, h] = args else {
        return None;
    };
    let rect = TileRect::new(x.parse().ok()?, y.parse().ok()?, w.parse().ok()?, h.parse().ok()?);
    Some((parse_zone(id)?, rect))
}

fn parse_rename(args: &[&str]) -> Option<Command> {
    let (id, rest) = args.split_first()?;
    if rest.is_empty() {
        return None;
    }
    Some(Command::Rename {
        zone: parse_zone(id)?,
        name: rest.join(" "),
    })
}

fn parse_clean(args: &[&str]) -> Option<Command> {
    let [x, y, radius] = args else {
        return None;
    };
    Some(Command::Clean {
        center: TilePos::new(x.parse().ok()?, y.parse().ok()?),
        radius: radius.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        assert_eq!(
            parse_command("create pvp Blood Pit"),
            Command::Create {
                zone_type: ZoneType::Pvp,
                name: Some("Blood Pit".to_string()),
            }
        );
        assert_eq!(
            parse_command("CREATE protected"),
            Command::Create {
                zone_type: ZoneType::Protected,
                name: None,
            }
        );
        assert!(matches!(parse_command("create castle"), Command::Unknown(_)));
    }

    #[test]
    fn test_parse_rect_edits() {
        assert_eq!(
            parse_command("expand #3 0 -4 10 2"),
            Command::Expand {
                zone: ZoneId(3),
                rect: TileRect::new(0, -4, 10, 2),
            }
        );
        assert_eq!(
            parse_command("shrink 3 1 1 1 1"),
            Command::Shrink {
                zone: ZoneId(3),
                rect: TileRect::new(1, 1, 1, 1),
            }
        );
        assert!(matches!(parse_command("expand 3 1 1"), Command::Unknown(_)));
        assert!(matches!(parse_command("expand x 1 1 1 1"), Command::Unknown(_)));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_command("delete 7"), Command::Delete(ZoneId(7)));
        assert_eq!(parse_command("split #2"), Command::Split(ZoneId(2)));
        assert_eq!(
            parse_command("rename 2 North Gate"),
            Command::Rename {
                zone: ZoneId(2),
                name: "North Gate".to_string(),
            }
        );
        assert_eq!(
            parse_command("clean 10 -3 8"),
            Command::Clean {
                center: TilePos::new(10, -3),
                radius: 8,
            }
        );
        assert!(matches!(parse_command("clean 1 2 -8"), Command::Unknown(_)));
        assert_eq!(parse_command("  q "), Command::Quit);
        assert_eq!(parse_command(""), Command::Unknown(String::new()));
    }
}
