use crate::{animation::ease::Ease, foundation::core::Vec2};

/// Linear interpolation between two values.
pub trait Lerp: Sized {
    /// Interpolate from `a` to `b` by `t` in `[0, 1]`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

/// Interpolation between adjacent keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterpMode {
    /// Keep the previous key's value until the next key.
    Hold,
    /// Interpolate (through the key's ease).
    #[default]
    Linear,
}

/// One `(time, value)` pair; `time` is clip-local seconds.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    /// Clip-local time in seconds.
    pub time: f64,
    /// Value at `time`.
    pub value: T,
    /// Ease applied toward the next key.
    #[serde(default)]
    pub ease: Ease,
}

/// Ordered keyframe track. Empty tracks have no opinion and callers fall back to a static value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframes<T> {
    /// Keys sorted by `time`.
    pub keys: Vec<Keyframe<T>>,
    /// Interpolation mode.
    #[serde(default)]
    pub mode: InterpMode,
}

impl<T> Default for Keyframes<T> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            mode: InterpMode::Linear,
        }
    }
}

impl<T> Keyframes<T>
where
    T: Lerp + Clone,
{
    /// `true` when the track has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert or replace the key at `time`, keeping keys sorted.
    pub fn set_key(&mut self, time: f64, value: T, ease: Ease) {
        let idx = self.keys.partition_point(|k| k.time < time);
        if let Some(k) = self.keys.get_mut(idx)
            && k.time == time
        {
            k.value = value;
            k.ease = ease;
            return;
        }
        self.keys.insert(idx, Keyframe { time, value, ease });
    }

    /// Sample at clip-local `t`; `None` when there are no keys.
    pub fn sample(&self, t: f64) -> Option<T> {
        let (value, _) = self.sample_with_ease(t)?;
        Some(value)
    }

    fn sample_with_ease(&self, t: f64) -> Option<(T, Ease)> {
        let first = self.keys.first()?;
        let idx = self.keys.partition_point(|k| k.time <= t);

        if idx == 0 {
            return Some((first.value.clone(), first.ease));
        }
        if idx >= self.keys.len() {
            let last = &self.keys[self.keys.len() - 1];
            return Some((last.value.clone(), last.ease));
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let span = b.time - a.time;
        if span <= 0.0 {
            return Some((a.value.clone(), a.ease));
        }

        let value = match self.mode {
            InterpMode::Hold => a.value.clone(),
            InterpMode::Linear => {
                let te = a.ease.apply((t - a.time) / span);
                T::lerp(&a.value, &b.value, te)
            }
        };
        Some((value, a.ease))
    }

    /// Cut out the `[start, end]` window and re-anchor it so `start` becomes local time 0.
    ///
    /// Keys strictly inside the window keep their values; boundary keys are synthesized from the
    /// curve so the slice samples identically at both edges. Keys outside are dropped.
    pub fn slice(&self, start: f64, end: f64) -> Self {
        if self.keys.is_empty() || end < start {
            return Self {
                keys: Vec::new(),
                mode: self.mode,
            };
        }

        let mut keys = Vec::new();
        if let Some((value, ease)) = self.sample_with_ease(start) {
            keys.push(Keyframe {
                time: 0.0,
                value,
                ease,
            });
        }
        keys.extend(
            self.keys
                .iter()
                .filter(|k| k.time > start && k.time < end)
                .map(|k| Keyframe {
                    time: k.time - start,
                    value: k.value.clone(),
                    ease: k.ease,
                }),
        );
        if end > start
            && let Some((value, ease)) = self.sample_with_ease(end)
        {
            keys.push(Keyframe {
                time: end - start,
                value,
                ease,
            });
        }

        Self {
            keys,
            mode: self.mode,
        }
    }

    /// Shift every key by `delta` seconds and drop keys that land before 0.
    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .filter(|k| k.time + delta >= 0.0)
                .map(|k| Keyframe {
                    time: k.time + delta,
                    value: k.value.clone(),
                    ease: k.ease,
                })
                .collect(),
            mode: self.mode,
        }
    }

    /// `true` when keys are sorted by time and all times are finite.
    pub fn is_valid(&self) -> bool {
        self.keys.iter().all(|k| k.time.is_finite())
            && self.keys.windows(2).all(|w| w[0].time <= w[1].time)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/anim.rs"]
mod tests;
