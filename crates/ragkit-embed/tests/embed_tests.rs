use ragkit_embed::similarity::cosine_similarity;
use ragkit_embed::{get_default_embedder, Embedder, HashEmbedder, DEFAULT_DIM};

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder();
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), embedder.dim());

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn case_and_punctuation_do_not_matter() {
    let e = HashEmbedder::default();
    let a = e.embed("How many vacation days?").expect("embed");
    let b = e.embed("how many Vacation days").expect("embed");
    assert!(cosine_similarity(&a, &b) > 0.999);
}

#[test]
fn shared_vocabulary_is_closer() {
    let e = HashEmbedder::new(DEFAULT_DIM);
    let q = e.embed("vacation days per year").expect("embed");
    let near = e.embed("employees get 22 vacation days per year").expect("embed");
    let far = e.embed("install the vpn client before travelling").expect("embed");
    assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
}

#[test]
fn empty_text_is_a_zero_vector() {
    let e = HashEmbedder::new(16);
    let v = e.embed("   ").expect("embed");
    assert_eq!(v.len(), 16);
    assert!(v.iter().all(|x| *x == 0.0));
    assert_eq!(e.id(), "hash-bow-16");
}
