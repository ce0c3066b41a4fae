//! PokeAPI, the community Pokémon database

use super::{get_json, ApiError};

/// Highest national dex number the trivia draws from
pub const MAX_DEX: u32 = 1025;

#[derive(serde::Deserialize)]
pub struct Pokemon {
    pub id: u32,
    /// Form name, e.g. `deoxys-normal`
    pub name: String,
    /// Species name, e.g. `deoxys`.  This is what people call it.
    pub species: NamedResource,
    /// Decimetres
    pub height: u32,
    /// Hectograms
    pub weight: u32,
    pub types: Vec<TypeSlot>,
    pub abilities: Vec<AbilitySlot>,
    pub stats: Vec<StatSlot>,
    pub sprites: Sprites,
}

#[derive(serde::Deserialize)]
pub struct TypeSlot {
    pub slot: u8,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(serde::Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedResource,
    pub is_hidden: bool,
}

#[derive(serde::Deserialize)]
pub struct StatSlot {
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(serde::Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct NamedResource {
    pub name: String,
}

#[derive(serde::Deserialize)]
struct Species {
    varieties: Vec<Variety>,
}

#[derive(serde::Deserialize)]
struct Variety {
    is_default: bool,
    pokemon: NamedResource,
}

impl Species {
    fn default_variety(&self) -> Option<&str> {
        self.varieties
            .iter()
            .find(|v| v.is_default)
            .or_else(|| self.varieties.first())
            .map(|v| v.pokemon.name.as_str())
    }
}

/// `mr-mime` becomes `Mr Mime`
pub fn display_name(api_name: &str) -> String {
    api_name
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl Pokemon {
    pub fn display_name(&self) -> String {
        display_name(&self.species.name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut slots: Vec<&TypeSlot> = self.types.iter().collect();
        slots.sort_by_key(|t| t.slot);
        slots.iter().map(|t| display_name(&t.kind.name)).collect()
    }

    pub fn height_m(&self) -> f64 {
        f64::from(self.height) / 10.0
    }

    pub fn weight_kg(&self) -> f64 {
        f64::from(self.weight) / 10.0
    }

    pub fn stat_total(&self) -> u32 {
        self.stats.iter().map(|s| s.base_stat).sum()
    }
}

pub async fn fetch(
    web: &reqwest::Client,
    api_url: &str,
    name_or_id: &str,
) -> Result<Pokemon, ApiError> {
    let key = name_or_id.trim().to_lowercase().replace(' ', "-");
    if key.is_empty() {
        return Err(ApiError::NotFound);
    }
    match get_json(web, &format!("{}/pokemon/{}", api_url, key), &[]).await {
        // Species like `deoxys` only exist under their form names
        Err(ApiError::NotFound) => {
            let species: Species =
                get_json(web, &format!("{}/pokemon-species/{}", api_url, key), &[]).await?;
            let variety = species.default_variety().ok_or(ApiError::NotFound)?;
            get_json(web, &format!("{}/pokemon/{}", api_url, variety), &[]).await
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": 122, "name": "mr-mime", "height": 13, "weight": 545,
        "species": {"name": "mr-mime", "url": "x"},
        "types": [
            {"slot": 2, "type": {"name": "fairy", "url": "x"}},
            {"slot": 1, "type": {"name": "psychic", "url": "x"}}
        ],
        "abilities": [
            {"ability": {"name": "soundproof", "url": "x"}, "is_hidden": false, "slot": 1},
            {"ability": {"name": "technician", "url": "x"}, "is_hidden": true, "slot": 3}
        ],
        "stats": [
            {"base_stat": 40, "effort": 0, "stat": {"name": "hp", "url": "x"}},
            {"base_stat": 100, "effort": 2, "stat": {"name": "special-attack", "url": "x"}}
        ],
        "sprites": {"front_default": "https://example.org/122.png", "back_default": null}
    }"#;

    #[test]
    fn decodes_and_formats() {
        let pokemon: Pokemon = crate::api::decode(SAMPLE.as_bytes()).unwrap();
        assert_eq!(pokemon.display_name(), "Mr Mime");
        assert_eq!(pokemon.type_names(), ["Psychic", "Fairy"]);
        assert_eq!(pokemon.height_m(), 1.3);
        assert_eq!(pokemon.weight_kg(), 54.5);
        assert_eq!(pokemon.stat_total(), 140);
        assert!(pokemon.abilities[1].is_hidden);
    }

    #[test]
    fn forms_are_named_after_their_species() {
        let pokemon: Pokemon = crate::api::decode(
            br#"{"id": 386, "name": "deoxys-normal", "height": 17, "weight": 608,
                "species": {"name": "deoxys", "url": "x"},
                "types": [{"slot": 1, "type": {"name": "psychic", "url": "x"}}],
                "abilities": [], "stats": [], "sprites": {"front_default": null}}"#,
        )
        .unwrap();
        assert_eq!(pokemon.name, "deoxys-normal");
        assert_eq!(pokemon.display_name(), "Deoxys");
    }

    #[test]
    fn species_resolve_to_their_default_variety() {
        let species: Species = crate::api::decode(
            br#"{"name": "giratina", "varieties": [
                {"is_default": false, "pokemon": {"name": "giratina-origin", "url": "x"}},
                {"is_default": true, "pokemon": {"name": "giratina-altered", "url": "x"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(species.default_variety(), Some("giratina-altered"));

        let empty: Species = crate::api::decode(br#"{"varieties": []}"#).unwrap();
        assert_eq!(empty.default_variety(), None);
    }
}
