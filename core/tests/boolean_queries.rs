use anyhow::Result;
use proptest::prelude::*;
use selfindex::query::QueryEngine;
use selfindex::{
    build_index, Compression, DataStore, DocId, Expr, IndexConfig, IndexInfo, MemoryStore, Optimization, QueryProc,
    SelfIndex, SourceDocument,
};

const VOCAB: &[&str] = &["the", "cat", "dog", "sat", "on", "mat"];

fn doc(id: DocId, text: &str) -> SourceDocument {
    SourceDocument::new(id, format!("doc{id}"), text.split_whitespace()).with_content(text)
}

fn cat_and_dog() -> Vec<SourceDocument> {
    vec![doc(1, "the cat sat on the mat"), doc(2, "the dog sat on the log")]
}

fn all_configs() -> Vec<IndexConfig> {
    let mut configs = Vec::new();
    for info in [IndexInfo::Boolean, IndexInfo::WordCount, IndexInfo::TfIdf] {
        for compression in [Compression::None, Compression::VarByte, Compression::Generic] {
            for query_proc in [QueryProc::TermAtATime, QueryProc::DocAtATime] {
                for optimization in [Optimization::None, Optimization::SkipPointers] {
                    configs.push(
                        IndexConfig::new(info, DataStore::Memory, compression, query_proc, optimization)
                            .with_skip_threshold(2),
                    );
                }
            }
        }
    }
    configs
}

#[test]
fn two_document_example_under_every_config() -> Result<()> {
    for config in all_configs() {
        let index = SelfIndex::new("example", config, MemoryStore::new())?;
        index.build(cat_and_dog())?;

        assert_eq!(index.search(r#""cat""#)?, vec![1], "{config}");
        assert_eq!(index.search(r#""sat" AND "on""#)?, vec![1, 2], "{config}");
        assert_eq!(index.search(r#""cat" OR "dog""#)?, vec![1, 2], "{config}");
        assert_eq!(index.search(r#"NOT "cat""#)?, vec![2], "{config}");
        assert_eq!(index.search(r#""the cat""#)?, vec![1], "{config}");
        assert_eq!(index.search(r#""zebra""#)?, Vec::<DocId>::new(), "{config}");
    }
    Ok(())
}

#[test]
fn keywords_are_case_insensitive_and_parentheses_group() -> Result<()> {
    let index = SelfIndex::new("example", IndexConfig::default(), MemoryStore::new())?;
    index.build(cat_and_dog())?;
    assert_eq!(index.search(r#""cat" or "dog" and "log""#)?, vec![1, 2]);
    assert_eq!(index.search(r#"("cat" OR "dog") AND "log""#)?, vec![2]);
    assert_eq!(index.search(r#"not not "cat""#)?, vec![1]);
    Ok(())
}

#[test]
fn inserted_token_breaks_a_phrase() -> Result<()> {
    let index = SelfIndex::new("phrase", IndexConfig::default(), MemoryStore::new())?;
    index.build(vec![
        doc(1, "new york city"),
        doc(2, "new big york city"),
        doc(3, "york new city"),
        doc(4, "the new york times in new york"),
    ])?;
    for strategy in [QueryProc::TermAtATime, QueryProc::DocAtATime] {
        assert_eq!(index.search_with(r#""new york""#, strategy)?, vec![1, 4]);
        assert_eq!(index.search_with(r#""new york city""#, strategy)?, vec![1]);
        assert_eq!(index.search_with(r#""york new""#, strategy)?, vec![3]);
        assert_eq!(index.search_with(r#""new york" AND NOT "times""#, strategy)?, vec![1]);
    }
    Ok(())
}

#[test]
fn skip_pointers_do_not_change_results_on_long_lists() -> Result<()> {
    let docs: Vec<SourceDocument> = (0..400)
        .map(|i| {
            let mut words = vec!["all"];
            if i % 2 == 0 {
                words.push("even");
            }
            if i % 3 == 0 {
                words.push("three");
            }
            if i % 7 == 0 {
                words.push("seven");
            }
            SourceDocument::new(i, "", words)
        })
        .collect();
    let plain = build_index(IndexConfig::default(), docs.clone())?;
    let skipping = build_index(
        IndexConfig::default().with_optimization(Optimization::SkipPointers).with_skip_threshold(2),
        docs,
    )?;
    let query = selfindex::parse_query(r#""even" AND "three" AND NOT "seven""#)?;
    let expected: Vec<DocId> = (0..400).filter(|i| i % 6 == 0 && i % 7 != 0).collect();
    for strategy in [QueryProc::TermAtATime, QueryProc::DocAtATime] {
        assert_eq!(QueryEngine::new(&plain).evaluate(&query, strategy), expected);
        assert_eq!(QueryEngine::new(&skipping).evaluate(&query, strategy), expected);
    }
    Ok(())
}

fn corpus() -> impl Strategy<Value = Vec<SourceDocument>> {
    proptest::collection::vec(proptest::collection::vec(proptest::sample::select(VOCAB), 0..8), 1..12).prop_map(
        |texts| {
            texts
                .into_iter()
                .enumerate()
                .map(|(i, words)| SourceDocument::new(i as DocId * 3, "", words))
                .collect()
        },
    )
}

fn leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        proptest::sample::select(VOCAB).prop_map(Expr::term),
        Just(Expr::term("absent")),
        proptest::collection::vec(proptest::sample::select(VOCAB), 2..4).prop_map(Expr::phrase),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::or(l, r)),
            inner.prop_map(Expr::not),
        ]
    })
}

proptest! {
    #[test]
    fn taat_and_daat_agree(docs in corpus(), e in expr(), skips in any::<bool>()) {
        let optimization = if skips { Optimization::SkipPointers } else { Optimization::None };
        let config = IndexConfig::default().with_optimization(optimization).with_skip_threshold(2);
        let index = build_index(config, docs).unwrap();
        let engine = QueryEngine::new(&index);
        prop_assert_eq!(
            engine.evaluate(&e, QueryProc::TermAtATime),
            engine.evaluate(&e, QueryProc::DocAtATime)
        );
    }

    #[test]
    fn de_morgan_holds(docs in corpus(), a in expr(), b in expr()) {
        let index = build_index(IndexConfig::default(), docs).unwrap();
        let engine = QueryEngine::new(&index);
        for strategy in [QueryProc::TermAtATime, QueryProc::DocAtATime] {
            let lhs = engine.evaluate(&Expr::not(Expr::and(a.clone(), b.clone())), strategy);
            let rhs = engine.evaluate(&Expr::or(Expr::not(a.clone()), Expr::not(b.clone())), strategy);
            prop_assert_eq!(lhs, rhs);

            let lhs = engine.evaluate(&Expr::not(Expr::or(a.clone(), b.clone())), strategy);
            let rhs = engine.evaluate(&Expr::and(Expr::not(a.clone()), Expr::not(b.clone())), strategy);
            prop_assert_eq!(lhs, rhs);
        }
    }

    #[test]
    fn printed_expressions_parse_back(e in expr()) {
        prop_assert_eq!(selfindex::parse_query(&e.to_string()).unwrap(), e);
    }
}
