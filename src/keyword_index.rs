use std::path::Path;

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::TopDocs,
    directory::MmapDirectory,
    doc,
    query::{BooleanQuery, FuzzyTermQuery, Occur, Query, QueryParser},
    schema::{
        FAST,
        Field,
        IndexRecordOption,
        STORED,
        Schema,
        TextFieldIndexing,
        TextOptions,
        Value,
    },
    tokenizer::{
        Language,
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::error::{Error, Result};

/// Writer heap budget used when building an index.
pub const WRITER_MEMORY_BUDGET: usize = 50_000_000;

const EN_STEM: &str = "en_stem";

pub mod fields {
    pub const PASSAGE_ID: &str = "passage_id";
    pub const CONTENT: &str = "content";
}

/// BM25 side index over passage content.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

#[derive(Clone, Copy)]
struct SchemaFields {
    passage_id: Field,
    content: Field,
}

/// A BM25 hit.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub score: f32,
    pub passage_id: u64,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_u64_field(fields::PASSAGE_ID, STORED | FAST);

    let content_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(EN_STEM)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    builder.add_text_field(fields::CONTENT, content_opts);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    let field = |name: &str| {
        schema.get_field(name).map_err(|_| {
            Error::Config(format!("keyword index is missing field '{name}'"))
        })
    };
    Ok(SchemaFields {
        passage_id: field(fields::PASSAGE_ID)?,
        content: field(fields::CONTENT)?,
    })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();
    index.tokenizers().register(EN_STEM, en_stem);
}

fn mmap_directory(dir: &Path) -> Result<MmapDirectory> {
    Ok(MmapDirectory::open(dir)
        .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?)
}

fn index_exists(dir: &MmapDirectory) -> Result<bool> {
    Ok(Index::exists(dir)
        .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?)
}

impl KeywordIndex {
    /// Open or create a keyword index in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mmap_dir = mmap_directory(dir)?;
        let index = if index_exists(&mmap_dir)? {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };
        Self::from_index(index)
    }

    /// Open the keyword index in `dir`, which must already hold one.
    pub fn open_existing(dir: &Path) -> Result<Self> {
        let missing = || Error::NotFound {
            kind: "keyword index",
            name: dir.display().to_string(),
        };
        if !dir.is_dir() {
            return Err(missing());
        }
        let mmap_dir = mmap_directory(dir)?;
        if !index_exists(&mmap_dir)? {
            return Err(missing());
        }
        Self::from_index(Index::open(mmap_dir)?)
    }

    /// In-memory index, for tests.
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index);
        let fields = resolve_fields(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    pub fn add_passage(
        &self,
        writer: &IndexWriter,
        passage_id: u64,
        content: &str,
    ) -> Result<()> {
        let f = self.fields;
        writer.add_document(doc!(
            f.passage_id => passage_id,
            f.content => content,
        ))?;
        Ok(())
    }

    /// BM25 search over passage content, top `limit` hits.
    ///
    /// With `fuzzy`, every query term of 3+ characters also matches terms
    /// within Levenshtein distance 1.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        fuzzy: bool,
    ) -> Result<Vec<KeywordHit>> {
        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(&self.index, vec![f.content]);
        let (bm25_query, _errors) = parser.parse_query_lenient(query_str);

        let query: Box<dyn Query> = if fuzzy {
            let mut clauses: Vec<(Occur, Box<dyn Query>)> =
                vec![(Occur::Should, bm25_query)];
            for word in query_str.split_whitespace() {
                let word = word
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                if word.chars().count() >= 3 {
                    let term = Term::from_field_text(f.content, &word);
                    clauses.push((
                        Occur::Should,
                        Box::new(FuzzyTermQuery::new(term, 1, true)),
                    ));
                }
            }
            Box::new(BooleanQuery::new(clauses))
        } else {
            bm25_query
        };

        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let passage_id = doc
                .get_first(f.passage_id)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    Error::Config("keyword hit has no stored passage id".to_string())
                })?;
            hits.push(KeywordHit { score, passage_id });
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for KeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordIndex").finish_non_exhaustive()
    }
}
