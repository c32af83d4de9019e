// Medley is an open source unified media search service.
// Copyright (C) 2023 Medley ApS
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{collections::HashMap, fs, path::Path};

use serde_json::Value;
use tantivy::{
    directory::MmapDirectory, schema::Schema, IndexReader, IndexWriter, ReloadPolicy,
};

use crate::{
    items::{AuthorDoc, BookDoc, MediaDoc, PersonDoc, PodcastDoc},
    schema::{create_schema, field_values, Collection, ID_FIELD, JSON_FIELD},
    taxonomy::normalize_tag,
    Error, Result,
};

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub struct CollectionHandle {
    pub index: tantivy::Index,
    pub reader: IndexReader,
    pub schema: Schema,
}

/// The set of inverted-index collections. The write primitives here are
/// used by tests and the external ETL; the query path only reads.
pub struct Index {
    collections: HashMap<Collection, CollectionHandle>,
}

impl Index {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut collections = HashMap::new();

        for collection in Collection::ALL {
            let dir = path.as_ref().join(collection.name());
            fs::create_dir_all(&dir)?;

            let schema = create_schema(collection);
            let index =
                tantivy::Index::open_or_create(MmapDirectory::open(&dir)?, schema.clone())?;

            collections.insert(collection, Self::handle(index, schema)?);
        }

        Ok(Self { collections })
    }

    pub fn temporary() -> Result<Self> {
        let mut collections = HashMap::new();

        for collection in Collection::ALL {
            let schema = create_schema(collection);
            let index = tantivy::Index::create_in_ram(schema.clone());
            collections.insert(collection, Self::handle(index, schema)?);
        }

        Ok(Self { collections })
    }

    fn handle(index: tantivy::Index, schema: Schema) -> Result<CollectionHandle> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommit)
            .try_into()?;

        Ok(CollectionHandle {
            index,
            reader,
            schema,
        })
    }

    pub fn collection(&self, collection: Collection) -> &CollectionHandle {
        &self.collections[&collection]
    }

    pub fn writer(&self, collection: Collection) -> Result<CollectionWriter> {
        let handle = self.collection(collection);

        Ok(CollectionWriter {
            collection,
            schema: handle.schema.clone(),
            writer: handle.index.writer(WRITER_HEAP_BYTES)?,
        })
    }

    /// Make committed documents visible. Readers also reload on commit, but
    /// tests want this deterministic.
    pub fn reload(&self) -> Result<()> {
        for handle in self.collections.values() {
            handle.reader.reload()?;
        }

        Ok(())
    }
}

pub struct CollectionWriter {
    collection: Collection,
    schema: Schema,
    writer: IndexWriter,
}

impl CollectionWriter {
    /// Index one document. The document keeps its full JSON form in a
    /// stored blob; indexed fields are projections of it.
    pub fn insert(&mut self, doc: &Value) -> Result<()> {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Internal("document has no id".to_string()))?;

        let mut document = tantivy::Document::default();

        document.add_text(self.field(ID_FIELD), id);
        document.add_text(self.field(JSON_FIELD), serde_json::to_string(doc)?);

        for (field, _) in self.collection.text_fields() {
            for value in field_values(doc, Collection::doc_key(field)) {
                document.add_text(self.field(field), value);
            }
        }

        for (field, _) in self.collection.tag_fields() {
            for value in field_values(doc, Collection::doc_key(field)) {
                let tag = normalize_tag(&value);
                if !tag.is_empty() {
                    document.add_text(self.field(field), tag);
                }
            }
        }

        for field in self.collection.numeric_fields() {
            if let Some(value) = doc.get(*field).and_then(Value::as_i64) {
                document.add_i64(self.field(field), value);
            }
        }

        self.writer.add_document(document)?;

        Ok(())
    }

    pub fn insert_media(&mut self, doc: &MediaDoc) -> Result<()> {
        self.insert(&serde_json::to_value(doc)?)
    }

    pub fn insert_person(&mut self, doc: &PersonDoc) -> Result<()> {
        self.insert(&serde_json::to_value(doc)?)
    }

    pub fn insert_podcast(&mut self, doc: &PodcastDoc) -> Result<()> {
        self.insert(&serde_json::to_value(doc)?)
    }

    pub fn insert_book(&mut self, doc: &BookDoc) -> Result<()> {
        self.insert(&serde_json::to_value(doc)?)
    }

    pub fn insert_author(&mut self, doc: &AuthorDoc) -> Result<()> {
        self.insert(&serde_json::to_value(doc)?)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;

        Ok(())
    }

    fn field(&self, name: &str) -> tantivy::schema::Field {
        self.schema.get_field(name).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn insert_requires_id() {
        let index = Index::temporary().unwrap();
        let mut writer = index.writer(Collection::Media).unwrap();

        let err = writer.insert(&json!({"search_title": "no id"}));
        assert!(err.is_err());
    }

    #[test]
    fn insert_and_commit() {
        let index = Index::temporary().unwrap();
        let mut writer = index.writer(Collection::Media).unwrap();

        writer
            .insert(&json!({
                "id": "tmdb_movie_1",
                "mc_type": "movie",
                "search_title": "Dune",
                "genres": ["Science Fiction"],
                "year": 2021,
                "popularity": 100.0
            }))
            .unwrap();
        writer.commit().unwrap();
        index.reload().unwrap();

        let handle = index.collection(Collection::Media);
        let searcher = handle.reader.searcher();
        assert_eq!(searcher.num_docs(), 1);
    }
}
