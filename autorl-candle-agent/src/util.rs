//! Utilities.
use anyhow::{anyhow, Result};
use autorl_core::Prng;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use ndarray::{Array1, Array2};
use rand::Rng;

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Blends `src` variables into `dest` variables.
///
/// Variables are matched by name.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn polyak_update(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("polyak update, tau = {}", tau);
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();

    for (name, v_dest) in dest.iter() {
        let v_src = src
            .get(name)
            .ok_or_else(|| anyhow!("no variable named {} in the source varmap", name))?;
        let blended = ((tau * v_src.as_tensor())? + (1.0 - tau) * v_dest.as_tensor())?;
        v_dest.set(&blended)?;
    }

    Ok(())
}

/// Re-initializes every variable of `varmap` from the given random stream.
///
/// Values are drawn uniformly from `[-b, b]` with `b = 1 / sqrt(fan)` per
/// tensor, `fan` being the trailing dimension. Variables are visited in name
/// order, so the result is a pure function of the stream.
pub fn seed_varmap(varmap: &VarMap, rng: &mut Prng) -> Result<()> {
    let data = varmap.data().lock().unwrap();
    let mut names = data.keys().cloned().collect::<Vec<_>>();
    names.sort();

    for name in names {
        let var = data.get(&name).unwrap();
        let dims = var.as_tensor().dims().to_vec();
        let fan = *dims.last().unwrap_or(&1) as f32;
        let bound = (1. / fan).sqrt();
        let n = dims.iter().product::<usize>();
        let values = (0..n)
            .map(|_| rng.gen_range(-bound..bound))
            .collect::<Vec<f32>>();
        let t = Tensor::from_vec(values, dims, var.as_tensor().device())?;
        var.set(&t)?;
    }

    Ok(())
}

/// Flattens all variables of `varmap` into one vector, in name order.
pub fn param_vector(varmap: &VarMap) -> Vec<f32> {
    let data = varmap.data().lock().unwrap();
    let mut names = data.keys().cloned().collect::<Vec<_>>();
    names.sort();

    let mut out = Vec::new();
    for name in names {
        let t = data.get(&name).unwrap().as_tensor();
        out.extend(t.flatten_all().unwrap().to_vec1::<f32>().unwrap());
    }
    out
}

/// Converts a batch of observations to a rank-2 tensor.
pub fn array2_to_tensor(a: &Array2<f32>, device: &Device) -> Result<Tensor> {
    let v = a.iter().cloned().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, (a.nrows(), a.ncols()), device)?)
}

/// Converts a batch of action indices to a rank-2 tensor for gathering.
pub fn actions_to_tensor(a: &Array1<i64>, device: &Device) -> Result<Tensor> {
    let v = a.iter().cloned().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, (a.len(), 1), device)?)
}

/// Converts a batch of scalars to a rank-1 tensor.
pub fn vec_to_tensor(v: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(v, (v.len(),), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;

    fn varmap_with(name: &str, values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Const(0.);
        vm.get((values.len(),), name, init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get(name).unwrap().set(&t)?;
        Ok(vm)
    }

    #[test]
    fn polyak_blends_by_name() -> Result<()> {
        let tau = 0.7;
        let src = varmap_with("var1", &[1.0, 2.0, 3.0])?;
        let dest = varmap_with("var1", &[4.0, 5.0, 6.0])?;

        polyak_update(&dest, &src, tau)?;

        let expected = [1.9f32, 2.9, 3.9];
        let got = param_vector(&dest);
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn polyak_with_tau_one_is_a_hard_copy() -> Result<()> {
        let src = varmap_with("var1", &[1.0, 2.0, 3.0])?;
        let dest = varmap_with("var1", &[4.0, 5.0, 6.0])?;

        polyak_update(&dest, &src, 1.0)?;

        assert_eq!(param_vector(&dest), param_vector(&src));
        Ok(())
    }

    #[test]
    fn seeding_is_deterministic() -> Result<()> {
        let a = varmap_with("var1", &[0.; 8])?;
        let b = varmap_with("var1", &[0.; 8])?;

        seed_varmap(&a, &mut Prng::seed_from_u64(5))?;
        seed_varmap(&b, &mut Prng::seed_from_u64(5))?;

        assert_eq!(param_vector(&a), param_vector(&b));
        assert!(param_vector(&a).iter().any(|v| *v != 0.));
        Ok(())
    }
}
