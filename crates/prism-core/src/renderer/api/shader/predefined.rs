// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Uniforms computed by the renderer for every draw.

/// A uniform whose value the renderer derives from view and draw state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedUniform {
    /// View rectangle `(x, y, width, height)`.
    ViewRect,
    /// `(1 / width, 1 / height)` of the view rectangle.
    ViewTexel,
    /// View matrix.
    View,
    /// Inverse view matrix.
    InvView,
    /// Projection matrix.
    Proj,
    /// Projection times view.
    ViewProj,
    /// Model matrices of the draw.
    Model,
    /// View times model.
    ModelView,
    /// Projection times view times model.
    ModelViewProj,
    /// Alpha reference of the render state, normalized.
    AlphaRef,
}

impl PredefinedUniform {
    /// Every predefined uniform.
    pub const ALL: [PredefinedUniform; 10] = [
        PredefinedUniform::ViewRect,
        PredefinedUniform::ViewTexel,
        PredefinedUniform::View,
        PredefinedUniform::InvView,
        PredefinedUniform::Proj,
        PredefinedUniform::ViewProj,
        PredefinedUniform::Model,
        PredefinedUniform::ModelView,
        PredefinedUniform::ModelViewProj,
        PredefinedUniform::AlphaRef,
    ];

    /// The shader-side name.
    pub const fn name(self) -> &'static str {
        match self {
            PredefinedUniform::ViewRect => "u_viewRect",
            PredefinedUniform::ViewTexel => "u_viewTexel",
            PredefinedUniform::View => "u_view",
            PredefinedUniform::InvView => "u_invView",
            PredefinedUniform::Proj => "u_proj",
            PredefinedUniform::ViewProj => "u_viewProj",
            PredefinedUniform::Model => "u_model",
            PredefinedUniform::ModelView => "u_modelView",
            PredefinedUniform::ModelViewProj => "u_modelViewProj",
            PredefinedUniform::AlphaRef => "u_alphaRef4",
        }
    }

    /// Looks a uniform up by shader-side name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|u| u.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for uniform in PredefinedUniform::ALL {
            assert_eq!(PredefinedUniform::from_name(uniform.name()), Some(uniform));
        }
        assert_eq!(PredefinedUniform::from_name("u_color"), None);
    }
}
