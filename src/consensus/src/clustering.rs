//! Semantic clustering of free-form responses
//!
//! Responses are flattened to their text leaves, tokenized, and projected
//! into a fixed-size bag-of-words vector with feature hashing (blake3 over the
//! token). Vectors are grouped with spherical k-means (cosine similarity).
//! Initialization is deterministic: the first point seeds cluster 0 and each
//! further seed is the point least similar to the seeds chosen so far.

use serde_json::Value;

/// Default hashed feature space size
pub const DEFAULT_DIMENSIONS: usize = 256;

const MAX_ITERATIONS: usize = 25;

/// Cosine k-means over hashed bag-of-words vectors
#[derive(Debug, Clone)]
pub struct SemanticClusterer {
    clusters: usize,
    dimensions: usize,
}

impl SemanticClusterer {
    /// Create a clusterer producing at most `clusters` groups
    pub fn new(clusters: usize) -> Self {
        Self {
            clusters: clusters.max(1),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Unit-length feature vector for a document; all zeros if it has no tokens
    pub fn embed(&self, value: &Value) -> Vec<f64> {
        let mut text = String::new();
        collect_text(value, &mut text);

        let mut vector = vec![0.0; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let hash = blake3::hash(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&hash.as_bytes()[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            vector[index] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    /// Cluster label per document, `None` for documents without any tokens
    pub fn cluster(&self, documents: &[&Value]) -> Vec<Option<usize>> {
        let vectors: Vec<Vec<f64>> = documents.iter().map(|d| self.embed(d)).collect();
        let points: Vec<usize> = (0..vectors.len())
            .filter(|i| vectors[*i].iter().any(|x| *x != 0.0))
            .collect();

        let mut labels = vec![None; vectors.len()];
        if points.is_empty() {
            return labels;
        }

        let mut centroids = seed_centroids(&vectors, &points, self.clusters);
        let mut assignment = vec![0usize; vectors.len()];

        for iteration in 0..MAX_ITERATIONS {
            let mut changed = false;
            for &p in &points {
                let nearest = nearest_centroid(&vectors[p], &centroids);
                if assignment[p] != nearest {
                    assignment[p] = nearest;
                    changed = true;
                }
            }
            if iteration > 0 && !changed {
                break;
            }

            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<usize> =
                    points.iter().copied().filter(|p| assignment[*p] == c).collect();
                // An emptied cluster keeps its previous centroid
                if members.is_empty() {
                    continue;
                }
                let mut mean = vec![0.0; self.dimensions];
                for m in members {
                    for (acc, x) in mean.iter_mut().zip(&vectors[m]) {
                        *acc += x;
                    }
                }
                normalize(&mut mean);
                *centroid = mean;
            }
        }

        for &p in &points {
            labels[p] = Some(assignment[p]);
        }
        labels
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Number(n) => {
            out.push_str(&n.to_string());
            out.push(' ');
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true " } else { "false " });
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        Value::Null => {}
    }
}

fn normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_similarity = f64::NEG_INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let similarity = cosine(point, centroid);
        if similarity > best_similarity {
            best = c;
            best_similarity = similarity;
        }
    }
    best
}

fn seed_centroids(vectors: &[Vec<f64>], points: &[usize], k: usize) -> Vec<Vec<f64>> {
    let mut seeds = vec![points[0]];
    while seeds.len() < k.min(points.len()) {
        let mut candidate = None;
        let mut lowest = f64::INFINITY;
        for &p in points {
            if seeds.contains(&p) {
                continue;
            }
            let closest = seeds
                .iter()
                .map(|s| cosine(&vectors[p], &vectors[*s]))
                .fold(f64::NEG_INFINITY, f64::max);
            if closest < lowest {
                lowest = closest;
                candidate = Some(p);
            }
        }
        match candidate {
            Some(p) => seeds.push(p),
            None => break,
        }
    }
    seeds.into_iter().map(|s| vectors[s].clone()).collect()
}
