use std::mem;

use quern_error::{QuernError, Result};

use crate::arrays::datatype::DataType;

/// A sequence of values of a single logical type.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Boolean(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
    List(ListArray),
}

impl Array {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
            Self::List(arr) => DataType::list(arr.elem_type().clone()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Utf8(v) => v.len(),
            Self::List(arr) => arr.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate number of bytes held by the values.
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) => v.len() * mem::size_of::<i64>(),
            Self::Float64(v) => v.len() * mem::size_of::<f64>(),
            Self::Utf8(v) => v.iter().map(|s| s.len() + mem::size_of::<String>()).sum(),
            Self::List(arr) => {
                arr.child.byte_size() + arr.offsets.len() * mem::size_of::<usize>()
            }
        }
    }

    /// Copy out the subrange `[offset, offset + len)`.
    pub fn slice(&self, offset: usize, len: usize) -> Array {
        match self {
            Self::Boolean(v) => Array::Boolean(v[offset..offset + len].to_vec()),
            Self::Int64(v) => Array::Int64(v[offset..offset + len].to_vec()),
            Self::Float64(v) => Array::Float64(v[offset..offset + len].to_vec()),
            Self::Utf8(v) => Array::Utf8(v[offset..offset + len].to_vec()),
            Self::List(arr) => Array::List(arr.slice(offset, len)),
        }
    }

    /// Produce an array where the value at row `i` appears `counts[i]` times.
    ///
    /// `counts` must have exactly one entry per row. Used to expand the
    /// non-unnested columns of a block during array unnesting.
    pub fn repeat(&self, counts: &[usize]) -> Result<Array> {
        if counts.len() != self.len() {
            return Err(QuernError::logical(format!(
                "cannot repeat array of length {} with {} counts",
                self.len(),
                counts.len()
            )));
        }

        Ok(match self {
            Self::Boolean(v) => Array::Boolean(repeat_values(v, counts)),
            Self::Int64(v) => Array::Int64(repeat_values(v, counts)),
            Self::Float64(v) => Array::Float64(repeat_values(v, counts)),
            Self::Utf8(v) => Array::Utf8(repeat_values(v, counts)),
            Self::List(arr) => {
                let rows: Vec<Array> = counts
                    .iter()
                    .enumerate()
                    .flat_map(|(idx, &count)| {
                        let row = arr.row(idx);
                        std::iter::repeat(row).take(count)
                    })
                    .collect();
                let refs: Vec<&Array> = rows.iter().collect();
                let child = concat(arr.elem_type().clone(), &refs)?;

                let mut offsets = Vec::with_capacity(rows.len() + 1);
                offsets.push(0);
                let mut offset = 0;
                for row in &rows {
                    offset += row.len();
                    offsets.push(offset);
                }

                Array::List(ListArray::try_new(arr.elem_type().clone(), offsets, child)?)
            }
        })
    }
}

fn repeat_values<T: Clone>(values: &[T], counts: &[usize]) -> Vec<T> {
    let total: usize = counts.iter().sum();
    let mut out = Vec::with_capacity(total);
    for (value, &count) in values.iter().zip(counts.iter()) {
        for _ in 0..count {
            out.push(value.clone());
        }
    }
    out
}

/// Concat arrays of the same type into a single array.
pub fn concat(datatype: DataType, arrays: &[&Array]) -> Result<Array> {
    for arr in arrays {
        if arr.datatype() != datatype {
            return Err(QuernError::logical(format!(
                "cannot concat array of type {} into {}",
                arr.datatype(),
                datatype
            )));
        }
    }

    Ok(match datatype {
        DataType::Boolean => Array::Boolean(concat_values(arrays, |arr| match arr {
            Array::Boolean(v) => v,
            _ => unreachable!("type checked above"),
        })),
        DataType::Int64 => Array::Int64(concat_values(arrays, |arr| match arr {
            Array::Int64(v) => v,
            _ => unreachable!("type checked above"),
        })),
        DataType::Float64 => Array::Float64(concat_values(arrays, |arr| match arr {
            Array::Float64(v) => v,
            _ => unreachable!("type checked above"),
        })),
        DataType::Utf8 => Array::Utf8(concat_values(arrays, |arr| match arr {
            Array::Utf8(v) => v,
            _ => unreachable!("type checked above"),
        })),
        DataType::List(meta) => {
            let lists: Vec<&ListArray> = arrays
                .iter()
                .map(|arr| match arr {
                    Array::List(list) => list,
                    _ => unreachable!("type checked above"),
                })
                .collect();

            let children: Vec<&Array> = lists.iter().map(|list| list.child()).collect();
            let child = concat((*meta.datatype).clone(), &children)?;

            let mut offsets = vec![0];
            let mut base = 0;
            for list in lists {
                for idx in 0..list.len() {
                    offsets.push(base + list.offsets[idx + 1]);
                }
                base += list.child().len();
            }

            Array::List(ListArray::try_new((*meta.datatype).clone(), offsets, child)?)
        }
    })
}

fn concat_values<'a, T: Clone + 'a>(
    arrays: &[&'a Array],
    get: impl Fn(&'a Array) -> &'a Vec<T>,
) -> Vec<T> {
    arrays
        .iter()
        .flat_map(|&arr| get(arr).iter().cloned())
        .collect()
}

/// An array of variable-length lists.
///
/// Stored as a flat child array plus `len + 1` offsets into it. The offsets
/// start at zero and end at the child's length, so the child holds exactly
/// the elements of this array's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ListArray {
    elem: DataType,
    offsets: Vec<usize>,
    child: Box<Array>,
}

impl ListArray {
    pub fn try_new(elem: DataType, offsets: Vec<usize>, child: Array) -> Result<Self> {
        if child.datatype() != elem {
            return Err(QuernError::logical(format!(
                "list child has type {}, expected {}",
                child.datatype(),
                elem
            )));
        }
        if offsets.first() != Some(&0)
            || offsets.last() != Some(&child.len())
            || offsets.windows(2).any(|w| w[0] > w[1])
        {
            return Err(QuernError::logical(format!(
                "invalid list offsets for child of length {}",
                child.len()
            )));
        }

        Ok(ListArray {
            elem,
            offsets,
            child: Box::new(child),
        })
    }

    /// Build a list array from one child array per row.
    pub fn try_from_rows(elem: DataType, rows: Vec<Array>) -> Result<Self> {
        let refs: Vec<&Array> = rows.iter().collect();
        let child = concat(elem.clone(), &refs)?;

        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        let mut offset = 0;
        for row in &rows {
            offset += row.len();
            offsets.push(offset);
        }

        Self::try_new(elem, offsets, child)
    }

    pub fn elem_type(&self) -> &DataType {
        &self.elem
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-row list lengths.
    pub fn lengths(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The flat element array.
    pub fn child(&self) -> &Array {
        &self.child
    }

    /// Copy out the elements of row `idx`.
    pub fn row(&self, idx: usize) -> Array {
        let start = self.offsets[idx];
        let end = self.offsets[idx + 1];
        self.child.slice(start, end - start)
    }

    fn slice(&self, offset: usize, len: usize) -> ListArray {
        let start = self.offsets[offset];
        let end = self.offsets[offset + len];
        let offsets: Vec<usize> = self.offsets[offset..offset + len + 1]
            .iter()
            .map(|o| o - start)
            .collect();

        ListArray {
            elem: self.elem.clone(),
            offsets,
            child: Box::new(self.child.slice(start, end - start)),
        }
    }
}
