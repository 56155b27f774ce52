use anyhow::{Result, bail};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Tag → ordered groups of hosts, e.g. `web → [[h1, h2], [h3]]`.
pub type Batches = BTreeMap<String, Vec<Vec<String>>>;

/// Shuffle each tag's hosts and cut them into groups of at most `serial`.
///
/// A `serial` of 0 puts every host of a tag in one group.
pub fn make_batches<R: Rng + ?Sized>(
    tag_to_hosts: &BTreeMap<String, Vec<String>>,
    serial: usize,
    rng: &mut R,
) -> Result<Batches> {
    let mut batches = Batches::new();
    for (tag, hosts) in tag_to_hosts {
        if hosts.is_empty() {
            bail!("tag {} has no hosts", tag);
        }
        // Randomize so the same host is not always the first to take a deploy.
        let mut hosts = hosts.clone();
        hosts.shuffle(rng);

        let groups = if serial == 0 {
            vec![hosts]
        } else {
            hosts.chunks(serial).map(<[String]>::to_vec).collect()
        };
        batches.insert(tag.clone(), groups);
    }
    if batches.is_empty() {
        bail!("empty batches, nothing to do");
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeSet;

    fn tags(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(tag, hosts)| {
                (tag.to_string(), hosts.iter().map(|h| h.to_string()).collect())
            })
            .collect()
    }

    fn sizes(groups: &[Vec<String>]) -> Vec<usize> {
        groups.iter().map(Vec::len).collect()
    }

    #[test]
    fn test_group_sizes() {
        let cases: &[(usize, &[usize], &[usize])] = &[
            (1, &[1, 1, 1], &[1, 1, 1, 1]),
            (2, &[2, 1], &[2, 2]),
            (3, &[3], &[3, 1]),
            (10, &[3], &[4]),
        ];
        let have = tags(&[("srv1", &["a", "b", "c"]), ("srv2", &["d", "e", "f", "g"])]);
        let mut rng = StdRng::seed_from_u64(7);
        for (serial, want1, want2) in cases {
            let batches = make_batches(&have, *serial, &mut rng).unwrap();
            assert_eq!(sizes(&batches["srv1"]), *want1, "serial {}", serial);
            assert_eq!(sizes(&batches["srv2"]), *want2, "serial {}", serial);
        }
    }

    #[test]
    fn test_covers_every_host_once() {
        let hosts: Vec<String> = (0..23).map(|i| format!("10.0.0.{}", i)).collect();
        let mut have = BTreeMap::new();
        have.insert("web".to_string(), hosts.clone());
        let mut rng = StdRng::seed_from_u64(42);
        for serial in 1..=25 {
            let batches = make_batches(&have, serial, &mut rng).unwrap();
            let groups = &batches["web"];
            assert_eq!(groups.len(), hosts.len().div_ceil(serial));
            assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= serial));
            let seen: Vec<&String> = groups.iter().flatten().collect();
            let unique: BTreeSet<&String> = seen.iter().copied().collect();
            assert_eq!(seen.len(), hosts.len());
            assert_eq!(unique.len(), hosts.len());
        }
    }

    #[test]
    fn test_serial_zero_is_one_group() {
        let have = tags(&[("srv1", &["a", "b", "c"]), ("srv2", &["d", "e"])]);
        let batches = make_batches(&have, 0, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(sizes(&batches["srv1"]), vec![3]);
        assert_eq!(sizes(&batches["srv2"]), vec![2]);
    }

    #[test]
    fn test_empty_tag_is_an_error() {
        let have = tags(&[("srv1", &[])]);
        assert!(make_batches(&have, 1, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn test_no_tags_is_an_error() {
        let err = make_batches(&BTreeMap::new(), 1, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err.to_string(), "empty batches, nothing to do");
    }
}
