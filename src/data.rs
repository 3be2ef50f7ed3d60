//! Observed data the likelihood functions score a trajectory against.
//!
//! Loading the data from disk is left to the caller. These types only check
//! that the layouts line up and give aligned access over fixed windows.

use std::ops::Range;

use itertools::Itertools;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum DataError {
    #[error("Cannot split {len} observations into {num_groups} groups of equal length")]
    UnevenGroups { len: usize, num_groups: usize },
    #[error("Got {binomial} binomial coefficients but {intervals} intervals")]
    LengthMismatch { binomial: usize, intervals: usize },
    #[error("Event boundary of step {step} is smaller than the one before")]
    NonMonotonic { step: usize },
    #[error("Event boundary {boundary} of step {step} is out of range for {num_events} events")]
    OutOfRange {
        step: usize,
        boundary: i64,
        num_events: usize,
    },
}

/// Observed case counts of one or more groups.
///
/// The groups are stored one after the other, each covering the same time
/// grid.
#[derive(Debug, Clone, Copy)]
pub struct IncidenceData<'a> {
    values: &'a [f64],
    group_len: usize,
}

impl<'a> IncidenceData<'a> {
    pub fn new(values: &'a [f64], num_groups: usize) -> Result<Self, DataError> {
        if num_groups == 0 || values.len() % num_groups != 0 {
            return Err(DataError::UnevenGroups {
                len: values.len(),
                num_groups,
            });
        }
        Ok(Self {
            values,
            group_len: values.len() / num_groups,
        })
    }

    pub fn num_groups(&self) -> usize {
        if self.group_len == 0 {
            return 0;
        }
        self.values.len() / self.group_len
    }

    pub fn group_len(&self) -> usize {
        self.group_len
    }

    pub fn group(&self, group: usize) -> &'a [f64] {
        &self.values[group * self.group_len..(group + 1) * self.group_len]
    }

    /// Sum of the observations of `group` over the simulation steps in
    /// `window`. Simulation step `t` corresponds to observation `t - shift`.
    pub fn window_sum(&self, group: usize, window: Range<usize>, shift: usize) -> f64 {
        let start = window.start - shift;
        self.group(group)[start..start + window.len()].iter().sum()
    }
}

/// Maps every timestep of the genealogy to the half-open range of events that
/// fall into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIndex {
    ends: Box<[usize]>,
}

impl EventIndex {
    /// Build the index from the inclusive last event index of every timestep.
    ///
    /// A timestep without events repeats the boundary of the step before it;
    /// `-1` marks leading steps before the first event.
    pub fn from_boundaries(boundaries: &[i64], num_events: usize) -> Result<Self, DataError> {
        if let Some((step, _)) = boundaries
            .iter()
            .tuple_windows()
            .find_position(|(prev, next)| next < prev)
        {
            return Err(DataError::NonMonotonic { step: step + 1 });
        }

        let ends = boundaries
            .iter()
            .enumerate()
            .map(|(step, &boundary)| {
                let end = boundary + 1;
                if end < 0 || end as usize > num_events {
                    return Err(DataError::OutOfRange {
                        step,
                        boundary,
                        num_events,
                    });
                }
                Ok(end as usize)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { ends })
    }

    pub fn num_steps(&self) -> usize {
        self.ends.len()
    }

    /// The events that fall into timestep `step`.
    pub fn events(&self, step: usize) -> Range<usize> {
        let start = match step {
            0 => 0,
            _ => self.ends[step - 1],
        };
        start..self.ends[step]
    }
}

/// A reconstructed genealogy, broken into intervals between consecutive
/// coalescence, sampling and step boundary events.
#[derive(Debug, Clone, PartialEq)]
pub struct Genealogy {
    binomial: Box<[f64]>,
    intervals: Box<[f64]>,
    index: EventIndex,
}

impl Genealogy {
    /// `binomial` holds the number of lineage pairs during each interval,
    /// `intervals` its length. A negative length marks an interval that ends
    /// in a coalescence.
    pub fn new(
        binomial: Vec<f64>,
        intervals: Vec<f64>,
        boundaries: &[i64],
    ) -> Result<Self, DataError> {
        if binomial.len() != intervals.len() {
            return Err(DataError::LengthMismatch {
                binomial: binomial.len(),
                intervals: intervals.len(),
            });
        }
        let index = EventIndex::from_boundaries(boundaries, binomial.len())?;
        Ok(Self {
            binomial: binomial.into(),
            intervals: intervals.into(),
            index,
        })
    }

    pub fn binomial(&self) -> &[f64] {
        &self.binomial
    }

    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn num_events(&self) -> usize {
        self.binomial.len()
    }
}
