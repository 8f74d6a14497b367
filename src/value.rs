//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

pub mod tensor;

pub use tensor::{Element, Tensor, TensorData};

pub const INLINE_DIMS: usize = 5;

/// Location of a leaf inside a nested value.
///
/// Containers contribute one component per nesting level, arrays contribute their
/// multi-index.
pub type IndexPath = SmallVec<[usize; INLINE_DIMS]>;

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
	Bool(bool),
	Int(i64),
	Float(f64),
}

impl Scalar {
	pub fn is_bool(self) -> bool {
		matches!(self, Self::Bool(_))
	}

	pub fn to_f64(self) -> f64 {
		match self {
			Self::Bool(b) => f64::from(u8::from(b)),
			Self::Int(i) => i as f64,
			Self::Float(x) => x,
		}
	}

	/// Float to int conversion truncates toward zero and saturates.
	pub fn to_i64(self) -> i64 {
		match self {
			Self::Bool(b) => i64::from(b),
			Self::Int(i) => i,
			Self::Float(x) => x as i64,
		}
	}

	pub fn to_bool(self) -> bool {
		match self {
			Self::Bool(b) => b,
			Self::Int(i) => i != 0,
			Self::Float(x) => x != 0.0,
		}
	}

	pub fn is_nan(self) -> bool {
		matches!(self, Self::Float(x) if x.is_nan())
	}

	pub fn is_infinite(self) -> bool {
		matches!(self, Self::Float(x) if x.is_infinite())
	}
}

impl std::fmt::Display for Scalar {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// The orderable subset of values. Used as set elements and mapping keys.
#[derive(Clone, Debug)]
pub enum Atom {
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	Bytes(Vec<u8>),
}

impl Atom {
	fn rank(&self) -> u8 {
		match self {
			Self::Bool(_) => 0,
			Self::Int(_) | Self::Float(_) => 1,
			Self::Str(_) => 2,
			Self::Bytes(_) => 3,
		}
	}
}

/// Exact comparison of an integer with a float. NaN orders above every number.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
	// 2^63
	const LIMIT: f64 = 9_223_372_036_854_775_808.0;
	if f.is_nan() || f >= LIMIT {
		return Ordering::Less;
	}
	if f < -LIMIT {
		return Ordering::Greater;
	}
	let whole = f.trunc();
	match i.cmp(&(whole as i64)) {
		Ordering::Equal if f > whole => Ordering::Less,
		Ordering::Equal if f < whole => Ordering::Greater,
		ord => ord,
	}
}

fn cmp_floats(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
	}
}

/// Numbers are ordered by value regardless of whether they are `Int` or `Float`,
/// so `1 == 1.0` and `0.0 == -0.0`.
impl Ord for Atom {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Self::Bool(a), Self::Bool(b)) => a.cmp(b),
			(Self::Int(a), Self::Int(b)) => a.cmp(b),
			(Self::Float(a), Self::Float(b)) => cmp_floats(*a, *b),
			(Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
			(Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).reverse(),
			(Self::Str(a), Self::Str(b)) => a.cmp(b),
			(Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
			_ => self.rank().cmp(&other.rank()),
		}
	}
}

impl PartialOrd for Atom {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Atom {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Atom {}

impl std::fmt::Display for Atom {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::Str(s) => write!(f, "{s:?}"),
			Self::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
		}
	}
}

impl From<bool> for Atom {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<i64> for Atom {
	fn from(i: i64) -> Self {
		Self::Int(i)
	}
}

impl From<i32> for Atom {
	fn from(i: i32) -> Self {
		Self::Int(i64::from(i))
	}
}

impl From<f64> for Atom {
	fn from(x: f64) -> Self {
		Self::Float(x)
	}
}

impl From<&str> for Atom {
	fn from(s: &str) -> Self {
		Self::Str(s.to_string())
	}
}

impl From<String> for Atom {
	fn from(s: String) -> Self {
		Self::Str(s)
	}
}

impl From<Vec<u8>> for Atom {
	fn from(b: Vec<u8>) -> Self {
		Self::Bytes(b)
	}
}

//--------------------------------------------------------------------------------------------------

/// Key/value entries in insertion order.
///
/// An `ordered` mapping behaves like an insertion-ordered dictionary: two ordered
/// mappings only match if their keys appear in the same order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mapping {
	entries: Vec<(Atom, Value)>,
	index: BTreeMap<Atom, usize>,
	ordered: bool,
}

impl Mapping {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn new_ordered() -> Self {
		Self { ordered: true, ..Self::default() }
	}

	/// Later duplicates replace the value of the first occurrence.
	pub(crate) fn from_entries(entries: Vec<(Atom, Value)>, ordered: bool) -> Self {
		let mut map = Self { entries: Vec::with_capacity(entries.len()), ordered, ..Self::default() };
		for (key, value) in entries {
			map.insert(key, value);
		}
		map
	}

	pub fn is_ordered(&self) -> bool {
		self.ordered
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns the previous value if the key was already present. The key keeps its
	/// original position.
	pub fn insert(&mut self, key: impl Into<Atom>, value: impl Into<Value>) -> Option<Value> {
		let key = key.into();
		let value = value.into();
		if let Some(&i) = self.index.get(&key) {
			return Some(std::mem::replace(&mut self.entries[i].1, value));
		}
		self.index.insert(key.clone(), self.entries.len());
		self.entries.push((key, value));
		None
	}

	pub fn with(mut self, key: impl Into<Atom>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn get(&self, key: &Atom) -> Option<&Value> {
		self.index.get(key).map(|&i| &self.entries[i].1)
	}

	pub fn contains_key(&self, key: &Atom) -> bool {
		self.index.contains_key(key)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, (Atom, Value)> {
		self.entries.iter()
	}

	pub fn keys(&self) -> impl Iterator<Item = &Atom> {
		self.entries.iter().map(|(k, _)| k)
	}

	pub fn sorted_entries(&self) -> Vec<&(Atom, Value)> {
		self.index.values().map(|&i| &self.entries[i]).collect()
	}
}

impl<'a> IntoIterator for &'a Mapping {
	type Item = &'a (Atom, Value);
	type IntoIter = std::slice::Iter<'a, (Atom, Value)>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Scalar(Scalar),
	Tensor(Tensor),
	Seq(Vec<Value>),
	Set(BTreeSet<Atom>),
	Map(Mapping),
	Str(String),
	Bytes(Vec<u8>),

	/// A value the comparator cannot look into. The string describes what it is.
	Opaque(String),
}

impl Value {
	pub fn seq<T: Into<Self>>(items: impl IntoIterator<Item = T>) -> Self {
		Self::Seq(items.into_iter().map(Into::into).collect())
	}

	pub fn set<T: Into<Atom>>(items: impl IntoIterator<Item = T>) -> Self {
		Self::Set(items.into_iter().map(Into::into).collect())
	}

	pub fn kind_name(&self) -> &'static str {
		match self {
			Self::Scalar(Scalar::Bool(_)) => "bool",
			Self::Scalar(Scalar::Int(_)) => "int",
			Self::Scalar(Scalar::Float(_)) => "float",
			Self::Tensor(_) => "tensor",
			Self::Seq(_) => "sequence",
			Self::Set(_) => "set",
			Self::Map(_) => "mapping",
			Self::Str(_) => "str",
			Self::Bytes(_) => "bytes",
			Self::Opaque(_) => "opaque",
		}
	}
}

impl From<Scalar> for Value {
	fn from(s: Scalar) -> Self {
		Self::Scalar(s)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Scalar(Scalar::Bool(b))
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Self::Scalar(Scalar::Int(i))
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Self::Scalar(Scalar::Int(i64::from(i)))
	}
}

impl From<f64> for Value {
	fn from(x: f64) -> Self {
		Self::Scalar(Scalar::Float(x))
	}
}

impl From<f32> for Value {
	fn from(x: f32) -> Self {
		Self::Scalar(Scalar::Float(f64::from(x)))
	}
}

impl From<Tensor> for Value {
	fn from(t: Tensor) -> Self {
		Self::Tensor(t)
	}
}

impl From<Vec<Self>> for Value {
	fn from(items: Vec<Self>) -> Self {
		Self::Seq(items)
	}
}

impl From<Mapping> for Value {
	fn from(m: Mapping) -> Self {
		Self::Map(m)
	}
}

impl From<BTreeSet<Atom>> for Value {
	fn from(s: BTreeSet<Atom>) -> Self {
		Self::Set(s)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::Str(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::Str(s)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_atom_order() {
		let set: BTreeSet<Atom> =
			[Atom::from("b"), Atom::from(3), Atom::from(f64::NAN), Atom::from(true)]
				.into_iter()
				.collect();
		let names: Vec<String> = set.iter().map(ToString::to_string).collect();
		assert_eq!(names, ["true", "3", "NaN", "\"b\""]);
		assert_eq!(Atom::from(f64::NAN), Atom::from(f64::NAN));
	}

	#[test]
	fn test_numeric_atoms_compare_by_value() {
		assert_eq!(Atom::from(1), Atom::from(1.0));
		assert_eq!(Atom::from(0.0), Atom::from(-0.0));
		assert!(Atom::from(1) < Atom::from(1.5));
		assert!(Atom::from(2) > Atom::from(1.5));
		assert!(Atom::from(-2) < Atom::from(-1.5));
		assert!(Atom::from(i64::MAX) < Atom::from(f64::INFINITY));
		assert!(Atom::from(i64::MIN) > Atom::from(f64::NEG_INFINITY));
		assert!(Atom::from(i64::MAX) < Atom::from(f64::NAN));
		assert_ne!(Atom::from(i64::MAX), Atom::from(i64::MAX as f64));
		assert_ne!(Atom::from(true), Atom::from(1));

		let set: BTreeSet<Atom> = [Atom::from(1), Atom::from(1.0), Atom::from(0.5)].into_iter().collect();
		assert_eq!(set.len(), 2);
	}

	#[test]
	fn test_mapping_insert_keeps_position() {
		let mut map = Mapping::new_ordered().with("x", 1).with("y", 2);
		let old = map.insert("x", 3);
		assert_eq!(old, Some(Value::from(1)));
		let keys: Vec<_> = map.keys().map(ToString::to_string).collect();
		assert_eq!(keys, ["\"x\"", "\"y\""]);
		assert_eq!(map.get(&Atom::from("x")), Some(&Value::from(3)));
	}

	#[test]
	fn test_mapping_numeric_keys() {
		let map = Mapping::new().with(1, "one").with(-0.0, "zero");
		assert_eq!(map.get(&Atom::from(1.0)), Some(&Value::from("one")));
		assert!(map.contains_key(&Atom::from(0)));
		assert!(!map.contains_key(&Atom::from(2)));
	}

	#[test]
	fn test_mapping_sorted_entries() {
		let map = Mapping::new().with("b", 2).with("a", 1);
		let sorted: Vec<_> = map.sorted_entries().iter().map(|(k, _)| k.to_string()).collect();
		assert_eq!(sorted, ["\"a\"", "\"b\""]);
	}
}

//--------------------------------------------------------------------------------------------------
