use structured_tensor::native::NativeValue;
use structured_tensor::pyval;
use structured_tensor::structured::{
    FieldInput, FieldValue, FromFieldsOptions, RaggedTensorSpec, StructuredTensor, StructuredTensorSpec,
    TensorSpec, TypeSpec,
};
use structured_tensor::tensor::{DType, DenseTensor, IndexType, RaggedTensor, RowPartition, TensorShape};
use structured_tensor::Error;

fn ragged(value: NativeValue) -> RaggedTensor {
    RaggedTensor::from_native(&value, None, None, IndexType::Int64).unwrap()
}

fn st(fields: Vec<(&str, FieldInput)>, shape: impl Into<TensorShape>) -> FieldValue {
    StructuredTensor::from_fields(fields, shape).unwrap().into()
}

fn struct_spec(shape: impl Into<TensorShape>, fields: Vec<(&str, TypeSpec)>) -> TypeSpec {
    StructuredTensorSpec::new(shape, fields).unwrap().into()
}

fn tensor_spec(shape: impl Into<TensorShape>, dtype: DType) -> TypeSpec {
    TensorSpec::new(shape, dtype).into()
}

struct Case {
    name: &'static str,
    pyval: NativeValue,
    spec: Option<TypeSpec>,
    expected: FieldValue,
}

fn pyval_cases() -> Vec<Case> {
    vec![
        Case {
            name: "ScalarEmptyDict",
            pyval: pyval!({}),
            spec: None,
            expected: st(vec![], TensorShape::scalar()),
        },
        Case {
            name: "ScalarSimple",
            pyval: pyval!({"a": 12, "b": [1, 2, 3], "c": [[1, 2], [3]]}),
            spec: None,
            expected: st(
                vec![
                    ("a", 12.into()),
                    ("b", vec![1, 2, 3].into()),
                    ("c", ragged(pyval!([[1, 2], [3]])).into()),
                ],
                TensorShape::scalar(),
            ),
        },
        Case {
            name: "ScalarSimpleWithTypeSpec",
            pyval: pyval!({"a": 12, "b": [1, 2, 3], "c": [[1, 2], [3]]}),
            spec: Some(struct_spec(
                TensorShape::scalar(),
                vec![
                    ("a", tensor_spec(TensorShape::scalar(), DType::Int32)),
                    ("b", tensor_spec([None], DType::Int32)),
                    ("c", RaggedTensorSpec::new([None, None], DType::Int32).unwrap().into()),
                ],
            )),
            expected: st(
                vec![
                    ("a", 12.into()),
                    ("b", vec![1, 2, 3].into()),
                    ("c", ragged(pyval!([[1, 2], [3]])).into()),
                ],
                TensorShape::scalar(),
            ),
        },
        Case {
            name: "ScalarWithNestedStruct",
            pyval: pyval!({"a": 12, "b": [1, 2, 3], "c": {"x": "Z", "y": [10, 20]}}),
            spec: None,
            expected: st(
                vec![
                    ("a", 12.into()),
                    ("b", vec![1, 2, 3].into()),
                    (
                        "c",
                        StructuredTensor::from_fields(
                            [("x", FieldInput::from("Z")), ("y", FieldInput::from(vec![10, 20]))],
                            TensorShape::scalar(),
                        )
                        .unwrap()
                        .into(),
                    ),
                ],
                TensorShape::scalar(),
            ),
        },
        Case {
            name: "EmptyList",
            pyval: pyval!([]),
            spec: None,
            expected: DenseTensor::from_native(&pyval!([]), None).unwrap().into(),
        },
        Case {
            name: "ListOfEmptyList",
            pyval: pyval!([[], []]),
            spec: None,
            expected: ragged(pyval!([[], []])).into(),
        },
        Case {
            name: "EmptyListWithTypeSpecAndFields",
            pyval: pyval!([]),
            spec: Some(struct_spec([0], vec![("a", tensor_spec(TensorShape::unknown(), DType::Int32))])),
            expected: st(
                vec![("a", DenseTensor::from_native(&pyval!([]), Some(DType::Int32)).unwrap().into())],
                [0],
            ),
        },
        Case {
            name: "EmptyListWithTypeSpecNoFieldsShape0_5",
            pyval: pyval!([]),
            spec: Some(struct_spec([0, 5], vec![])),
            expected: st(vec![], [0, 5]),
        },
        Case {
            name: "EmptyListWithTypeSpecNoFieldsShape1_0",
            pyval: pyval!([[]]),
            spec: Some(struct_spec([1, 0], vec![])),
            expected: st(vec![], [1, 0]),
        },
        Case {
            name: "VectorOfDict",
            pyval: pyval!([{"a": 1}, {"a": 2}]),
            spec: None,
            expected: st(vec![("a", vec![1, 2].into())], [2]),
        },
        Case {
            name: "VectorOfDictWithNestedStructScalar",
            pyval: pyval!([{"a": 1, "b": {"x": [1, 2]}}, {"a": 2, "b": {"x": [3]}}]),
            spec: None,
            expected: st(
                vec![
                    ("a", vec![1, 2].into()),
                    ("b", st(vec![("x", ragged(pyval!([[1, 2], [3]])).into())], [2]).into()),
                ],
                [2],
            ),
        },
        Case {
            name: "VectorOfDictWithNestedStructVector",
            pyval: pyval!([{"a": 1, "b": [{"x": [1, 2]}, {"x": [5]}]}, {"a": 2, "b": [{"x": [3]}]}]),
            spec: None,
            expected: st(
                vec![
                    ("a", vec![1, 2].into()),
                    (
                        "b",
                        st(vec![("x", ragged(pyval!([[[1, 2], [5]], [[3]]])).into())], [Some(2), None]).into(),
                    ),
                ],
                [2],
            ),
        },
        Case {
            name: "Ragged2DOfDict",
            pyval: pyval!([[{"a": 1}, {"a": 2}, {"a": 3}], [{"a": 4}, {"a": 5}]]),
            spec: None,
            expected: st(vec![("a", ragged(pyval!([[1, 2, 3], [4, 5]])).into())], [Some(2), None]),
        },
        // without a spec every tensor of rank 2 or more is ragged
        Case {
            name: "MatrixOfDictWithoutTypeSpec",
            pyval: pyval!([[{"a": 1}, {"a": 2}, {"a": 3}], [{"a": 4}, {"a": 5}, {"a": 6}]]),
            spec: None,
            expected: st(vec![("a", ragged(pyval!([[1, 2, 3], [4, 5, 6]])).into())], [Some(2), None]),
        },
        Case {
            name: "MatrixOfDictWithTypeSpec",
            pyval: pyval!([[{"a": 1}, {"a": 2}, {"a": 3}], [{"a": 4}, {"a": 5}, {"a": 6}]]),
            spec: Some(struct_spec([2, 3], vec![("a", tensor_spec(TensorShape::unknown(), DType::Int32))])),
            expected: st(vec![("a", pyval!([[1, 2, 3], [4, 5, 6]]).into())], [2, 3]),
        },
    ]
}

#[test]
fn pyval_conversion() {
    for case in pyval_cases() {
        let actual = StructuredTensor::from_pyval(&case.pyval, case.spec.as_ref())
            .unwrap_or_else(|e| panic!("{}: {e}", case.name));
        assert_eq!(actual, case.expected, "{}", case.name);
        if let FieldValue::Structured(actual) = &actual {
            assert_eq!(actual.to_pyval().unwrap(), case.pyval, "{}", case.name);
        }
    }
}

#[test]
fn pyval_matches_spec() {
    for case in pyval_cases() {
        let Some(spec) = &case.spec else {
            continue;
        };
        let actual = StructuredTensor::from_pyval(&case.pyval, Some(spec)).unwrap();
        assert!(spec.is_compatible_with(&actual), "{}", case.name);
    }
}

#[test]
fn type_spec_of_converted_value() {
    let value = StructuredTensor::from_pyval(&pyval!([{"a": 1, "b": [1, 2]}, {"a": 2, "b": []}]), None).unwrap();
    let spec = value.type_spec();
    let TypeSpec::Structured(spec) = &spec else {
        panic!("expected a StructuredTensorSpec, got {spec}");
    };
    assert_eq!(spec.shape(), &TensorShape::from([2]));
    assert_eq!(spec.field_specs().keys().collect::<Vec<_>>(), ["a", "b"]);
    assert!(matches!(spec.field_spec("a"), Some(TypeSpec::Tensor(_))));
    assert!(matches!(spec.field_spec("b"), Some(TypeSpec::Ragged(_))));

    // converting again with the spec of a value reproduces it
    let again = StructuredTensor::from_pyval(&value.to_pyval().unwrap(), Some(&value.type_spec())).unwrap();
    assert_eq!(again, value);
}

#[test]
fn ragged_spec_of_empty_list() {
    let spec: TypeSpec = RaggedTensorSpec::new([None, None, Some(3)], DType::Float32)
        .and_then(|spec| spec.with_ragged_rank(1))
        .unwrap()
        .into();
    let value = StructuredTensor::from_pyval(&pyval!([]), Some(&spec)).unwrap();
    let rt = value.as_ragged().unwrap();
    assert_eq!(rt.nrows(), 0);
    assert_eq!(rt.ragged_rank(), 1);
    assert_eq!(rt.dtype(), DType::Float32);
    assert_eq!(rt.flat_values().shape(), [0, 3]);
    assert!(spec.is_compatible_with(&value));
}

#[test]
fn ragged_spec_with_row_splits_dtype() {
    let spec = RaggedTensorSpec::new([None, None], DType::Int64)
        .unwrap()
        .with_row_splits_dtype(IndexType::Int32);
    let spec = struct_spec([2], vec![("a", spec.into())]);
    let value = StructuredTensor::from_pyval(&pyval!([{"a": [1, 2]}, {"a": []}]), Some(&spec)).unwrap();
    let st = value.as_structured().unwrap();
    let a = st.field_value("a").unwrap().as_ragged().unwrap();
    assert_eq!(a.dtype(), DType::Int64);
    assert_eq!(a.row_splits_dtype(), IndexType::Int32);
    assert_eq!(
        a.nested_row_partitions()[0],
        RowPartition::from_row_lengths(&[2, 0]).with_dtype(IndexType::Int32).unwrap()
    );
}

#[test]
fn spec_field_missing_from_dicts() {
    let spec = struct_spec(
        [2],
        vec![
            ("a", tensor_spec([None], DType::Int32)),
            ("b", tensor_spec([None], DType::Float64)),
        ],
    );
    // a field of the spec that no dictionary has is converted from an empty list
    let err = StructuredTensor::from_pyval(&pyval!([{"a": 1}, {"a": 2}]), Some(&spec)).unwrap_err();
    assert!(err.message().contains("Error parsing path"), "{err}");

    let spec = struct_spec([0], vec![("b", tensor_spec([None], DType::Float64))]);
    let value = StructuredTensor::from_pyval(&pyval!([]), Some(&spec)).unwrap();
    let b = value.as_structured().unwrap().field_value("b").unwrap().as_tensor().unwrap();
    assert_eq!(b.shape(), [0]);
    assert_eq!(b.dtype(), DType::Float64);
}

#[test]
fn from_pyval_errors() {
    struct ErrorCase {
        name: &'static str,
        pyval: NativeValue,
        spec: Option<TypeSpec>,
        msg: &'static str,
    }
    let cases = [
        ErrorCase {
            name: "MissingKeys",
            pyval: pyval!([{"a": [1, 2]}, {"b": [3, 4]}]),
            spec: None,
            msg: "'b'",
        },
        ErrorCase {
            name: "TypeSpecMismatch_DictKey",
            pyval: pyval!({"a": 1}),
            spec: Some(struct_spec([1], vec![("b", tensor_spec(TensorShape::scalar(), DType::Int32))])),
            msg: "does not match typespec",
        },
        ErrorCase {
            name: "TypeSpecMismatch_ListDictKey",
            pyval: pyval!([{"a": 1}]),
            spec: Some(struct_spec([1], vec![("b", tensor_spec(TensorShape::scalar(), DType::Int32))])),
            msg: "does not match typespec",
        },
        ErrorCase {
            name: "TypeSpecMismatch_RankMismatch",
            pyval: pyval!([{"a": 1}]),
            spec: Some(struct_spec(
                TensorShape::scalar(),
                vec![("a", tensor_spec(TensorShape::scalar(), DType::Int32))],
            )),
            msg: "does not match typespec (rank mismatch)",
        },
        ErrorCase {
            name: "TypeSpecMismatch_Scalar",
            pyval: pyval!(0),
            spec: Some(struct_spec(TensorShape::scalar(), vec![])),
            msg: "does not match typespec",
        },
        ErrorCase {
            name: "TypeSpecMismatch_ListTensor",
            pyval: pyval!({"a": [[1]]}),
            spec: Some(struct_spec(
                TensorShape::scalar(),
                vec![("a", tensor_spec(TensorShape::scalar(), DType::Int32))],
            )),
            msg: r#"Value at ("a",) does not match typespec"#,
        },
        ErrorCase {
            name: "TypeSpecMismatch_ListTensorShape",
            pyval: pyval!([1, 2]),
            spec: Some(tensor_spec([3], DType::Int32)),
            msg: "does not match typespec",
        },
        ErrorCase {
            name: "TypeSpecMismatch_ListStruct",
            pyval: pyval!([[1]]),
            spec: Some(struct_spec([1, 1], vec![("a", tensor_spec(TensorShape::scalar(), DType::Int32))])),
            msg: "does not match typespec",
        },
        ErrorCase {
            name: "InconsistentDictionaryDepth",
            pyval: pyval!([{}, [{}]]),
            spec: None,
            msg: "Inconsistent depth of dictionaries",
        },
        ErrorCase {
            name: "DictMixedWithEmptyList",
            pyval: pyval!([{"a": 1}, []]),
            spec: None,
            msg: "Inconsistent depth of dictionaries",
        },
        ErrorCase {
            name: "DictMixedWithScalar",
            pyval: pyval!([[{}], 5]),
            spec: None,
            msg: "Expected dict or nested list/tuple of dict",
        },
    ];
    for case in cases {
        let err = StructuredTensor::from_pyval(&case.pyval, case.spec.as_ref())
            .expect_err(case.name);
        assert!(err.message().contains(case.msg), "{}: {err}", case.name);
    }

    let err = StructuredTensor::from_pyval(&pyval!([{"a": [1, 2]}, {"b": [3, 4]}]), None).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn leaf_errors_name_the_path() {
    // strings and numbers can not share a tensor
    let err = StructuredTensor::from_pyval(&pyval!({"a": {"b": [1, "x"]}}), None).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.message().starts_with(r#"Error parsing path ("a", "b"): "#), "{err}");
}

#[test]
fn to_pyval_requires_evaluation() {
    let a = RaggedTensor::from_row_lengths(DenseTensor::from_vec(vec![1, 2, 3]), &[2, 1]).unwrap();
    let b = RaggedTensor::from_row_lengths(DenseTensor::from_vec(vec![4, 5, 6]), &[2, 1]).unwrap();
    let st = StructuredTensor::from_fields_with(
        [("a", FieldInput::from(a)), ("b", FieldInput::from(b))],
        [Some(2), None],
        FromFieldsOptions::new().validate(true),
    )
    .unwrap();
    let err = st.to_pyval().unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert!(err.message().contains("only supported once materialized"));
    assert_eq!(
        st.evaluate().unwrap().to_pyval().unwrap(),
        pyval!([[{"a": 1, "b": 4}, {"a": 2, "b": 5}], [{"a": 3, "b": 6}]])
    );
}
