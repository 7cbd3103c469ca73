//! Static catalog of worlds, data centers, and regions.
//!
//! Built once at startup from the packed game-data asset (see `bin/pack.rs`)
//! and immutable afterwards; every accessor is lock-free.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entities::{DataCenter, Region, World};

/// Worlds that are live on the market board but not flagged public in the
/// game data.
pub const FORCED_PUBLIC_WORLDS: [i32; 4] = [408, 409, 410, 411];

/// World 25 shares its name with the Chaos data center; keeping it would make
/// name resolution ambiguous.
const EXCLUDED_WORLDS: [i32; 1] = [25];

const REGIONS: [(u8, &str); 7] = [
    (1, "Japan"),
    (2, "North-America"),
    (3, "Europe"),
    (4, "Oceania"),
    (5, "中国"),
    (6, "Eorzea"), // ?
    (7, "한국"),
];

/// Raw `World` sheet row as written by `bin/pack.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRow {
    pub id: i32,
    pub name: String,
    pub data_center: i32,
    pub is_public: bool,
}

/// Raw `WorldDCGroupType` sheet row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcRow {
    pub id: i32,
    pub name: String,
    pub region: u8,
}

/// Raw `Item` sheet row, reduced to the market-relevant fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: i32,
    pub item_search_category: i32,
    pub stack_size: i32,
}

/// The packed game-data asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameData {
    pub worlds: Vec<WorldRow>,
    pub data_centers: Vec<DcRow>,
    pub items: Vec<ItemRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum GameDataError {
    #[error("failed to read game data asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode game data asset: {0}")]
    Decode(#[from] bincode::Error),
}

/// The disjoint union a `worldOrDc` token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldOrDc {
    World(World),
    Dc(DataCenter),
}

#[derive(Debug)]
pub struct WorldDcResolver {
    worlds_by_id: BTreeMap<i32, String>,
    worlds_by_name: HashMap<String, i32>,
    marketable: BTreeSet<i32>,
    stack_sizes: HashMap<i32, i32>,
    data_centers: Vec<DataCenter>,
    dc_by_lower_name: HashMap<String, usize>,
}

impl WorldDcResolver {
    /// Reads the zstd-compressed bincode asset and builds the catalog.
    pub fn load(path: &Path) -> Result<Self, GameDataError> {
        let file = File::open(path)?;
        let mut decoder = zstd::stream::Decoder::new(file)?;
        let data: GameData = bincode::deserialize_from(&mut decoder)?;
        Ok(Self::from_game_data(&data))
    }

    pub fn from_game_data(data: &GameData) -> Self {
        let mut worlds_by_id = BTreeMap::new();
        for world in &data.worlds {
            if EXCLUDED_WORLDS.contains(&world.id) {
                continue;
            }
            let public = world.data_center > 0 && world.is_public;
            if public || FORCED_PUBLIC_WORLDS.contains(&world.id) {
                worlds_by_id.insert(world.id, world.name.clone());
            }
        }

        let mut data_centers = Vec::new();
        for dc in &data.data_centers {
            if dc.id <= 0 || dc.id >= 99 {
                continue;
            }
            let world_ids: BTreeSet<i32> = data
                .worlds
                .iter()
                .filter(|w| w.data_center == dc.id && worlds_by_id.contains_key(&w.id))
                .map(|w| w.id)
                .collect();
            if world_ids.is_empty() {
                continue;
            }
            data_centers.push(DataCenter {
                name: dc.name.clone(),
                region: region_name(dc.region),
                world_ids,
            });
        }

        // The Chinese and Korean servers are absent from the game data and
        // ship as static catalogs.
        for (worlds, dcs) in [chinese_catalog(), korean_catalog()] {
            for world in worlds {
                worlds_by_id.insert(world.id, world.name);
            }
            data_centers.extend(dcs);
        }

        let mut marketable = BTreeSet::new();
        let mut stack_sizes = HashMap::new();
        for item in &data.items {
            if item.item_search_category >= 1 {
                marketable.insert(item.id);
                stack_sizes.insert(item.id, item.stack_size);
            }
        }

        let worlds_by_name = worlds_by_id
            .iter()
            .map(|(id, name)| (name.clone(), *id))
            .collect();
        let dc_by_lower_name = data_centers
            .iter()
            .enumerate()
            .map(|(idx, dc)| (dc.name.to_lowercase(), idx))
            .collect();

        Self {
            worlds_by_id,
            worlds_by_name,
            marketable,
            stack_sizes,
            data_centers,
            dc_by_lower_name,
        }
    }

    pub const fn worlds_by_id(&self) -> &BTreeMap<i32, String> {
        &self.worlds_by_id
    }

    pub const fn worlds_by_name(&self) -> &HashMap<String, i32> {
        &self.worlds_by_name
    }

    pub fn world_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.worlds_by_id.keys().copied()
    }

    pub const fn marketable_items(&self) -> &BTreeSet<i32> {
        &self.marketable
    }

    pub fn is_marketable(&self, item_id: i32) -> bool {
        self.marketable.contains(&item_id)
    }

    pub fn stack_size(&self, item_id: i32) -> Option<i32> {
        self.stack_sizes.get(&item_id).copied()
    }

    pub fn data_centers(&self) -> &[DataCenter] {
        &self.data_centers
    }

    pub fn regions(&self) -> Vec<Region> {
        REGIONS
            .iter()
            .map(|&(id, name)| Region {
                id,
                name: name.to_string(),
            })
            .collect()
    }

    /// Parses a `worldOrDc` token: a known world id, then a world name in
    /// canonical form, then a data-center name (case-insensitive exact).
    pub fn resolve(&self, token: &str) -> Option<WorldOrDc> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Ok(id) = token.parse::<i32>() {
            if id > 0 {
                if let Some(name) = self.worlds_by_id.get(&id) {
                    return Some(WorldOrDc::World(World {
                        id,
                        name: name.clone(),
                    }));
                }
            }
        }

        let canonical = canonicalize_world_name(token);
        if let Some(&id) = self.worlds_by_name.get(&canonical) {
            return Some(WorldOrDc::World(World {
                id,
                name: canonical,
            }));
        }

        if let Some(&idx) = self.dc_by_lower_name.get(&token.to_lowercase()) {
            return Some(WorldOrDc::Dc(self.data_centers[idx].clone()));
        }

        None
    }
}

/// Canonical world-name form: first code point uppercased, rest lowercased.
/// ASCII-only policy, so the Chinese and Korean names pass through untouched.
fn canonicalize_world_name(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(token.len());
            out.push(first.to_ascii_uppercase());
            out.push_str(&chars.as_str().to_ascii_lowercase());
            out
        }
        None => String::new(),
    }
}

fn region_name(id: u8) -> String {
    REGIONS
        .iter()
        .find(|&&(region_id, _)| region_id == id)
        .map_or_else(|| "Unknown".to_string(), |&(_, name)| name.to_string())
}

fn static_catalog(
    region: &str,
    dcs: &[(&str, &[(i32, &str)])],
) -> (Vec<World>, Vec<DataCenter>) {
    let mut worlds = Vec::new();
    let mut data_centers = Vec::new();
    for &(dc_name, members) in dcs {
        let mut world_ids = BTreeSet::new();
        for &(id, name) in members {
            world_ids.insert(id);
            worlds.push(World {
                id,
                name: name.to_string(),
            });
        }
        data_centers.push(DataCenter {
            name: dc_name.to_string(),
            region: region.to_string(),
            world_ids,
        });
    }
    (worlds, data_centers)
}

fn chinese_catalog() -> (Vec<World>, Vec<DataCenter>) {
    static_catalog(
        "中国",
        &[
            (
                "陆行鸟",
                &[
                    (1042, "拉诺西亚"),
                    (1044, "幻影群岛"),
                    (1060, "萌芽池"),
                    (1081, "神意之地"),
                    (1167, "红玉海"),
                    (1173, "宇宙和音"),
                    (1174, "沃仙曦染"),
                    (1175, "晨曦王座"),
                ],
            ),
            (
                "莫古力",
                &[
                    (1076, "白金幻象"),
                    (1113, "旅人栈桥"),
                    (1121, "拂晓之间"),
                    (1166, "龙巢神殿"),
                    (1170, "潮风亭"),
                    (1171, "神拳痕"),
                    (1172, "白银乡"),
                    (1179, "梦羽宝境"),
                ],
            ),
            (
                "猫小胖",
                &[
                    (1043, "紫水栈桥"),
                    (1045, "摩杜纳"),
                    (1106, "静语庄园"),
                    (1169, "延夏"),
                    (1177, "海猫茶屋"),
                    (1178, "柔风海湾"),
                    (1192, "琥珀原"),
                ],
            ),
            (
                "豆豆柴",
                &[
                    (1064, "月牙湾"),
                    (1068, "黄金谷"),
                    (1180, "太阳海岸"),
                    (1183, "银泪湖"),
                    (1186, "伊修加德"),
                    (1187, "雪松原"),
                    (1201, "红茶川"),
                ],
            ),
        ],
    )
}

fn korean_catalog() -> (Vec<World>, Vec<DataCenter>) {
    static_catalog(
        "한국",
        &[(
            "한국",
            &[
                (2075, "카벙클"),
                (2076, "초코보"),
                (2077, "모그리"),
                (2078, "톤베리"),
                (2080, "펜리르"),
            ],
        )],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> GameData {
        GameData {
            worlds: vec![
                WorldRow {
                    id: 23,
                    name: "Asura".into(),
                    data_center: 1,
                    is_public: true,
                },
                WorldRow {
                    id: 24,
                    name: "Belias".into(),
                    data_center: 1,
                    is_public: true,
                },
                WorldRow {
                    id: 25,
                    name: "Chaos".into(),
                    data_center: 1,
                    is_public: true,
                },
                WorldRow {
                    id: 408,
                    name: "Cuchulainn".into(),
                    data_center: 2,
                    is_public: false,
                },
                WorldRow {
                    id: 50,
                    name: "Hidden".into(),
                    data_center: 0,
                    is_public: true,
                },
                WorldRow {
                    id: 51,
                    name: "Closed".into(),
                    data_center: 3,
                    is_public: false,
                },
            ],
            data_centers: vec![
                DcRow {
                    id: 1,
                    name: "Aether".into(),
                    region: 2,
                },
                DcRow {
                    id: 2,
                    name: "Dynamis".into(),
                    region: 2,
                },
                DcRow {
                    id: 3,
                    name: "Empty".into(),
                    region: 3,
                },
                DcRow {
                    id: 99,
                    name: "Internal".into(),
                    region: 2,
                },
            ],
            items: vec![
                ItemRow {
                    id: 5057,
                    item_search_category: 48,
                    stack_size: 999,
                },
                ItemRow {
                    id: 1,
                    item_search_category: 0,
                    stack_size: 1,
                },
            ],
        }
    }

    #[test]
    fn applies_world_loading_rules() {
        let resolver = WorldDcResolver::from_game_data(&fixture());
        assert!(resolver.worlds_by_id().contains_key(&23));
        // unflagged but force-included
        assert!(resolver.worlds_by_id().contains_key(&408));
        // name collision with the Chaos DC
        assert!(!resolver.worlds_by_id().contains_key(&25));
        // no data center
        assert!(!resolver.worlds_by_id().contains_key(&50));
        // not public
        assert!(!resolver.worlds_by_id().contains_key(&51));
    }

    #[test]
    fn applies_dc_loading_rules() {
        let resolver = WorldDcResolver::from_game_data(&fixture());
        let names: Vec<&str> = resolver
            .data_centers()
            .iter()
            .map(|dc| dc.name.as_str())
            .collect();
        assert!(names.contains(&"Aether"));
        assert!(names.contains(&"Dynamis"));
        assert!(!names.contains(&"Empty"));
        assert!(!names.contains(&"Internal"));
        // the static catalogs are concatenated after the game data
        assert!(names.contains(&"陆行鸟"));
        assert!(names.contains(&"한국"));

        let aether = resolver
            .data_centers()
            .iter()
            .find(|dc| dc.name == "Aether")
            .unwrap();
        assert_eq!(
            aether.world_ids.iter().copied().collect::<Vec<_>>(),
            vec![23, 24]
        );
        assert_eq!(aether.region, "North-America");
    }

    #[test]
    fn resolves_ids_names_and_dcs() {
        let resolver = WorldDcResolver::from_game_data(&fixture());

        match resolver.resolve("23") {
            Some(WorldOrDc::World(w)) => assert_eq!(w.name, "Asura"),
            other => panic!("unexpected: {other:?}"),
        }
        match resolver.resolve("aSuRa") {
            Some(WorldOrDc::World(w)) => assert_eq!(w.id, 23),
            other => panic!("unexpected: {other:?}"),
        }
        match resolver.resolve("AETHER") {
            Some(WorldOrDc::Dc(dc)) => assert_eq!(dc.name, "Aether"),
            other => panic!("unexpected: {other:?}"),
        }
        match resolver.resolve("红玉海") {
            Some(WorldOrDc::World(w)) => assert_eq!(w.id, 1167),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("Nonsense"), None);
        // a known-looking integer that is not a catalog world
        assert_eq!(resolver.resolve("9999"), None);
    }

    #[test]
    fn round_trips_every_world() {
        let resolver = WorldDcResolver::from_game_data(&fixture());
        for (&id, name) in resolver.worlds_by_id() {
            match resolver.resolve(name) {
                Some(WorldOrDc::World(w)) => assert_eq!(w.id, id),
                other => panic!("{name} did not resolve: {other:?}"),
            }
            match resolver.resolve(&id.to_string()) {
                Some(WorldOrDc::World(w)) => assert_eq!(w.id, id),
                other => panic!("{id} did not resolve: {other:?}"),
            }
        }
    }

    #[test]
    fn marketable_items_follow_search_category() {
        let resolver = WorldDcResolver::from_game_data(&fixture());
        assert!(resolver.is_marketable(5057));
        assert!(!resolver.is_marketable(1));
        assert_eq!(resolver.stack_size(5057), Some(999));
        assert_eq!(resolver.stack_size(1), None);
    }

    #[test]
    fn canonicalizes_ascii_only() {
        assert_eq!(canonicalize_world_name("phoenix"), "Phoenix");
        assert_eq!(canonicalize_world_name("PHOENIX"), "Phoenix");
        assert_eq!(canonicalize_world_name("红玉海"), "红玉海");
    }
}
