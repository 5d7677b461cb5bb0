use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;
use std::error::Error;

static PACK_DIR: Dir = include_dir!("src/packs");

/// A symbol is one tappable glyph. Emoji frequently span several `char`s
/// (variation selectors, ZWJ sequences), so symbols are owned strings.
pub type Symbol = String;

/// A purchasable set of symbols the board draws from.
#[derive(Deserialize, Clone, Debug)]
pub struct SymbolPack {
    pub name: String,
    pub cost: u32,
    pub symbols: Vec<Symbol>,
}

impl SymbolPack {
    pub fn load(id: &str) -> Result<Self, Box<dyn Error>> {
        let file = PACK_DIR
            .get_file(format!("{}.json", id.to_lowercase()))
            .ok_or_else(|| format!("unknown symbol pack: {id}"))?;

        let contents = file
            .contents_utf8()
            .ok_or("pack file is not valid UTF-8")?;

        let pack: SymbolPack = from_str(contents)?;
        Ok(pack)
    }
}

/// Ids of every embedded pack, in filename order.
pub fn available_packs() -> Vec<String> {
    let mut ids: Vec<String> = PACK_DIR
        .files()
        .filter_map(|f| f.path().file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    ids.sort();
    ids
}
