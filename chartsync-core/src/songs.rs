use std::collections::BTreeSet;

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSong {
    pub category: Option<String>,
    pub song_type: Option<String>,
    pub title: Option<String>,
}

impl ServerSong {
    /// Reads one listing entry. Non-object entries yield `None`; string and
    /// number fields are kept as text, empty strings and zero count as absent.
    pub fn from_value(entry: &Value) -> Option<Self> {
        let entry = entry.as_object()?;
        let field = |name: &str| entry.get(name).and_then(key_text);
        Some(Self {
            category: field("category"),
            song_type: field("song_type"),
            title: field("title"),
        })
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().or(self.song_type.as_deref())
    }

    pub fn key(&self) -> Option<String> {
        let category = self.category()?;
        let title = self.title.as_deref()?;
        Some(format!("{category}/{title}"))
    }
}

pub fn server_key_set<'a>(songs: impl IntoIterator<Item = &'a ServerSong>) -> BTreeSet<String> {
    songs.into_iter().filter_map(ServerSong::key).collect()
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(entry: Value) -> ServerSong {
        ServerSong::from_value(&entry).unwrap()
    }

    #[test]
    fn prefers_category_over_song_type() {
        let entry = parse(json!({ "category": "05 Variety", "song_type": "01 Pop", "title": "Conflict" }));
        assert_eq!(entry.key().as_deref(), Some("05 Variety/Conflict"));
    }

    #[test]
    fn falls_back_to_song_type_when_category_is_empty() {
        let entry = parse(json!({ "category": "", "song_type": "01 Pop", "title": "X" }));
        assert_eq!(entry.key().as_deref(), Some("01 Pop/X"));
    }

    #[test]
    fn numeric_fields_are_kept_as_text() {
        let entry = parse(json!({ "song_type": "10 Taiko Towers", "title": 123 }));
        assert_eq!(entry.key().as_deref(), Some("10 Taiko Towers/123"));

        let entry = parse(json!({ "category": 7, "song_type": "01 Pop", "title": "X" }));
        assert_eq!(entry.key().as_deref(), Some("7/X"));
    }

    #[test]
    fn null_zero_and_structured_fields_count_as_absent() {
        let entry = parse(json!({ "category": null, "song_type": "01 Pop", "title": 0 }));
        assert_eq!(entry.key(), None);

        let entry = parse(json!({ "category": ["01 Pop"], "song_type": false, "title": "X" }));
        assert_eq!(entry.key(), None);
    }

    #[test]
    fn entries_without_category_or_title_are_dropped() {
        let songs: Vec<ServerSong> = [
            json!({ "title": "orphan" }),
            json!({ "category": "02 Anime" }),
            json!({ "category": "02 Anime", "title": "Y", "id": 7 }),
            json!("garbage"),
        ]
        .iter()
        .filter_map(ServerSong::from_value)
        .collect();

        let keys = server_key_set(&songs);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["02 Anime/Y"]);
    }
}
