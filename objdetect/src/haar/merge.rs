use super::detect::Detection;
use super::params::MergePolicy;
use cv_core::Rect;

/// Collapses overlapping raw detections.
pub fn merge(detections: &[Detection], policy: MergePolicy) -> Vec<Rect> {
    let rects: Vec<Rect> = detections.iter().map(|d| d.rect).collect();
    merge_rects(&rects, policy)
}

/// Groups rectangles into connected components of the overlap graph and emits
/// one representative per component.
///
/// Membership does not depend on input order. Output follows the order in which
/// components are discovered, i.e. the index of each component's first member.
pub fn merge_rects(rects: &[Rect], policy: MergePolicy) -> Vec<Rect> {
    let mut assigned = vec![false; rects.len()];
    let mut cluster = Vec::new();
    let mut merged = Vec::new();

    for seed in 0..rects.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        cluster.clear();
        cluster.push(seed);

        let mut head = 0;
        while head < cluster.len() {
            let current = rects[cluster[head]];
            head += 1;
            for (j, other) in rects.iter().enumerate() {
                if !assigned[j] && current.intersects(other) {
                    assigned[j] = true;
                    cluster.push(j);
                }
            }
        }

        merged.push(representative(rects, &cluster, policy));
    }
    merged
}

fn representative(rects: &[Rect], members: &[usize], policy: MergePolicy) -> Rect {
    match policy {
        MergePolicy::Average => {
            let (mut x, mut y, mut w, mut h) = (0i32, 0i32, 0i32, 0i32);
            for &i in members {
                let r = rects[i];
                x += r.x as i32;
                y += r.y as i32;
                w += r.w as i32;
                h += r.h as i32;
            }
            let n = members.len() as i32;
            Rect::new((x / n) as i16, (y / n) as i16, (w / n) as i16, (h / n) as i16)
        }
        MergePolicy::Union => members
            .iter()
            .map(|&i| rects[i])
            .reduce(|acc, r| acc.union(&r))
            .unwrap_or_default(),
    }
}
