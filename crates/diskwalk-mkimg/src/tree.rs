use crate::{BuildError, Result};

pub(crate) const ROOT: usize = 0;

pub(crate) enum Kind {
    Dir(Vec<usize>),
    File(Vec<u8>),
    /// A second directory entry naming an existing directory.
    Alias(usize),
    /// A record copied into the directory verbatim.
    Raw(Vec<u8>),
}

pub(crate) struct Node {
    pub name: String,
    pub parent: usize,
    pub kind: Kind,
}

/// Path-addressed tree shared by both builders. Children keep insertion
/// order, which becomes on-disk order.
pub(crate) struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: ROOT,
                kind: Kind::Dir(Vec::new()),
            }],
        }
    }

    pub fn children(&self, dir: usize) -> &[usize] {
        match &self.nodes[dir].kind {
            Kind::Dir(children) => children,
            _ => &[],
        }
    }

    fn lookup(&self, dir: usize, name: &str) -> Option<usize> {
        self.children(dir)
            .iter()
            .copied()
            .find(|&c| !matches!(self.nodes[c].kind, Kind::Raw(_)) && self.nodes[c].name == name)
    }

    /// Resolve a path to a directory, creating missing components.
    pub fn mkdir_all(&mut self, path: &str) -> Result<usize> {
        let mut dir = ROOT;
        for name in components(path) {
            dir = match self.lookup(dir, name) {
                Some(next) if matches!(self.nodes[next].kind, Kind::Dir(_)) => next,
                Some(_) => return Err(BuildError::NotADirectory(path.to_owned())),
                None => self.push_dir(dir, name),
            };
        }
        Ok(dir)
    }

    /// Directory that must exist already.
    pub fn find_dir(&self, path: &str) -> Result<usize> {
        let mut dir = ROOT;
        for name in components(path) {
            dir = match self.lookup(dir, name) {
                Some(next) if matches!(self.nodes[next].kind, Kind::Dir(_)) => next,
                _ => return Err(BuildError::NotADirectory(path.to_owned())),
            };
        }
        Ok(dir)
    }

    /// Add a leaf at `path`; its parents are created as needed.
    pub fn insert(&mut self, path: &str, kind: Kind) -> Result<usize> {
        let (parent, name) = match path.trim_end_matches('/').rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        if name.is_empty() || name == "." || name == ".." {
            return Err(BuildError::BadName(path.to_owned()));
        }
        let dir = self.mkdir_all(parent)?;
        if self.lookup(dir, name).is_some() {
            return Err(BuildError::Exists(path.to_owned()));
        }
        Ok(self.push(dir, name, kind))
    }

    /// A new, empty directory directly under `parent`.
    pub fn push_dir(&mut self, parent: usize, name: &str) -> usize {
        self.push(parent, name, Kind::Dir(Vec::new()))
    }

    pub fn push_raw(&mut self, dir: usize, record: Vec<u8>) {
        self.push(dir, "", Kind::Raw(record));
    }

    fn push(&mut self, parent: usize, name: &str, kind: Kind) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_owned(),
            parent,
            kind,
        });
        if let Kind::Dir(children) = &mut self.nodes[parent].kind {
            children.push(index);
        }
        index
    }

    /// Directories in creation order, root first.
    pub fn dirs(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| matches!(self.nodes[i].kind, Kind::Dir(_)))
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}
